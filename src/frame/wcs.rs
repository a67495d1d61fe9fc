//! # Astrometric solution of a frame
//!
//! Implements the TAN (gnomonic) projection between sky positions and the
//! pixel grid, with the optional SIP polynomial distortion used by
//! full-frame survey images.
//!
//! Conventions
//! -----------------
//! * Pixel coordinates are **0-based** (`CRPIXn` is stored minus one), x is
//!   the column and y the row of the pixel array.
//! * Sky coordinates are ICRS degrees.
//! * The linear part uses the CD matrix when present, then `PCi_j × CDELTi`,
//!   then the `CDELTi` / `CROTA2` convention.
//! * SIP: the forward polynomials (`A_p_q`, `B_p_q`) distort pixel offsets
//!   before the linear transform; the inverse polynomials (`AP_p_q`, `BP_p_q`)
//!   are applied after it when projecting sky → pixel. When a header carries
//!   forward terms without inverse terms, sky → pixel inverts the forward
//!   polynomials by fixed-point iteration.
use nalgebra::{Matrix2, Vector2};

use crate::{
    constants::{Degree, PixelPos, RADEG},
    ffiphot_errors::FfiphotError,
};

/// One SIP polynomial: `Σ coeff · u^p · v^q`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SipPolynomial {
    terms: Vec<(i32, i32, f64)>,
}

impl SipPolynomial {
    pub fn new(terms: Vec<(i32, i32, f64)>) -> Self {
        SipPolynomial { terms }
    }

    fn from_header<F>(get_keyword: &mut F, prefix: &str) -> Option<Self>
    where
        F: FnMut(&str) -> Option<f64>,
    {
        let order = get_keyword(&format!("{prefix}_ORDER"))? as i32;
        let mut terms = Vec::new();
        for p in 0..=order {
            for q in 0..=(order - p) {
                if let Some(coeff) = get_keyword(&format!("{prefix}_{p}_{q}")) {
                    if coeff != 0.0 {
                        terms.push((p, q, coeff));
                    }
                }
            }
        }
        Some(SipPolynomial { terms })
    }

    #[inline]
    fn eval(&self, u: f64, v: f64) -> f64 {
        self.terms
            .iter()
            .map(|&(p, q, c)| c * u.powi(p) * v.powi(q))
            .sum()
    }
}

/// Pair of SIP polynomials acting on the (u, v) pixel offsets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SipDistortion {
    pub u: SipPolynomial,
    pub v: SipPolynomial,
}

/// Iteration cap and convergence threshold (pixels) of [`SipDistortion::invert`].
const SIP_INVERT_MAX_ITERS: usize = 50;
const SIP_INVERT_TOLERANCE: f64 = 1e-10;

impl SipDistortion {
    fn apply(&self, offset: Vector2<f64>) -> Vector2<f64> {
        let (u, v) = (offset.x, offset.y);
        Vector2::new(u + self.u.eval(u, v), v + self.v.eval(u, v))
    }

    /// Offset `o` such that `apply(o) == distorted`, found by iterating
    /// `o ← distorted − (apply(o) − o)` from `o = distorted`.
    ///
    /// SIP terms are small corrections, so the map is a contraction over
    /// the image and a few iterations reach sub-nanopixel agreement.
    fn invert(&self, distorted: Vector2<f64>) -> Vector2<f64> {
        let mut offset = distorted;
        for _ in 0..SIP_INVERT_MAX_ITERS {
            let next = distorted - (self.apply(offset) - offset);
            let step = (next - offset).norm();
            offset = next;
            if !(step > SIP_INVERT_TOLERANCE) {
                break;
            }
        }
        offset
    }
}

/// World Coordinate System of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    /// Reference pixel (0-based x, y)
    pub crpix: Vector2<f64>,
    /// Sky position of the reference pixel (RA, Dec in degrees)
    pub crval: (Degree, Degree),
    /// Linear transform, degrees per pixel
    pub cd: Matrix2<f64>,
    /// Forward distortion (pixel → intermediate)
    pub sip: Option<SipDistortion>,
    /// Inverse distortion (intermediate → pixel)
    pub sip_inverse: Option<SipDistortion>,
}

impl Wcs {
    /// Build an undistorted TAN solution.
    ///
    /// Arguments
    /// -----------------
    /// * `crpix`: 0-based reference pixel `(x, y)`.
    /// * `crval`: sky position of the reference pixel `(ra, dec)` in degrees.
    /// * `cd`: CD matrix rows `[[cd1_1, cd1_2], [cd2_1, cd2_2]]` in degrees per pixel.
    pub fn tan(crpix: PixelPos, crval: (Degree, Degree), cd: [[f64; 2]; 2]) -> Self {
        Wcs {
            crpix: Vector2::new(crpix.0, crpix.1),
            crval,
            cd: Matrix2::new(cd[0][0], cd[0][1], cd[1][0], cd[1][1]),
            sip: None,
            sip_inverse: None,
        }
    }

    /// Build a solution from header keywords.
    ///
    /// Arguments
    /// -----------------
    /// * `get_keyword`: lookup of a numeric header keyword, `None` when absent.
    ///
    /// Return
    /// ----------
    /// * The solution, or [`FfiphotError::Image`] if a reference keyword is missing.
    pub fn from_header<F>(mut get_keyword: F) -> Result<Self, FfiphotError>
    where
        F: FnMut(&str) -> Option<f64>,
    {
        let mut required = |key: &str| {
            get_keyword(key)
                .ok_or_else(|| FfiphotError::Image(format!("missing WCS keyword {key}")))
        };
        let crpix1 = required("CRPIX1")? - 1.0;
        let crpix2 = required("CRPIX2")? - 1.0;
        let crval1 = required("CRVAL1")?;
        let crval2 = required("CRVAL2")?;

        let cd = if let (Some(cd1_1), Some(cd1_2), Some(cd2_1), Some(cd2_2)) = (
            get_keyword("CD1_1"),
            get_keyword("CD1_2"),
            get_keyword("CD2_1"),
            get_keyword("CD2_2"),
        ) {
            Matrix2::new(cd1_1, cd1_2, cd2_1, cd2_2)
        } else {
            let cdelt1 = get_keyword("CDELT1").unwrap_or(-1.0 / 3600.0);
            let cdelt2 = get_keyword("CDELT2").unwrap_or(1.0 / 3600.0);
            if let Some(pc1_1) = get_keyword("PC1_1") {
                let pc1_2 = get_keyword("PC1_2").unwrap_or(0.0);
                let pc2_1 = get_keyword("PC2_1").unwrap_or(0.0);
                let pc2_2 = get_keyword("PC2_2").unwrap_or(1.0);
                Matrix2::new(
                    cdelt1 * pc1_1,
                    cdelt1 * pc1_2,
                    cdelt2 * pc2_1,
                    cdelt2 * pc2_2,
                )
            } else {
                let (sin_r, cos_r) = (get_keyword("CROTA2").unwrap_or(0.0) * RADEG).sin_cos();
                Matrix2::new(
                    cdelt1 * cos_r,
                    -cdelt2 * sin_r,
                    cdelt1 * sin_r,
                    cdelt2 * cos_r,
                )
            }
        };

        let sip = match (
            SipPolynomial::from_header(&mut get_keyword, "A"),
            SipPolynomial::from_header(&mut get_keyword, "B"),
        ) {
            (Some(u), Some(v)) => Some(SipDistortion { u, v }),
            _ => None,
        };
        let sip_inverse = match (
            SipPolynomial::from_header(&mut get_keyword, "AP"),
            SipPolynomial::from_header(&mut get_keyword, "BP"),
        ) {
            (Some(u), Some(v)) => Some(SipDistortion { u, v }),
            _ => None,
        };

        Ok(Wcs {
            crpix: Vector2::new(crpix1, crpix2),
            crval: (crval1, crval2),
            cd,
            sip,
            sip_inverse,
        })
    }

    /// Project a sky position onto the pixel grid.
    ///
    /// Arguments
    /// -----------------
    /// * `ra`, `dec`: sky position in degrees.
    ///
    /// Return
    /// ----------
    /// * The 0-based `(x, y)` pixel position, or [`FfiphotError::Projection`] when the
    ///   position lies on the far hemisphere of the tangent point, the CD matrix is
    ///   singular, or the result is not finite.
    pub fn sky_to_pixel(&self, ra: Degree, dec: Degree) -> Result<PixelPos, FfiphotError> {
        let (sin_dec, cos_dec) = (dec * RADEG).sin_cos();
        let (sin_dec0, cos_dec0) = (self.crval.1 * RADEG).sin_cos();
        let (sin_dra, cos_dra) = ((ra - self.crval.0) * RADEG).sin_cos();

        let denom = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra;
        if !(denom > 0.0) {
            return Err(FfiphotError::Projection(format!(
                "({ra}, {dec}) is not on the visible side of the tangent point"
            )));
        }

        // intermediate world coordinates, degrees
        let xi = cos_dec * sin_dra / denom / RADEG;
        let eta = (sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra) / denom / RADEG;

        let cd_inv = self
            .cd
            .try_inverse()
            .ok_or_else(|| FfiphotError::Projection("singular CD matrix".into()))?;
        let linear = cd_inv * Vector2::new(xi, eta);
        let offset = match (&self.sip_inverse, &self.sip) {
            (Some(inverse), _) => inverse.apply(linear),
            (None, Some(forward)) => forward.invert(linear),
            (None, None) => linear,
        };

        let pixel = self.crpix + offset;
        if !(pixel.x.is_finite() && pixel.y.is_finite()) {
            return Err(FfiphotError::Projection(format!(
                "({ra}, {dec}) projects to a non-finite pixel"
            )));
        }
        Ok((pixel.x, pixel.y))
    }

    /// Deproject a pixel position to the sky.
    ///
    /// Return
    /// ----------
    /// * `(ra, dec)` in degrees, RA normalized to `[0, 360)`.
    pub fn pixel_to_sky(&self, x: f64, y: f64) -> (Degree, Degree) {
        let mut offset = Vector2::new(x, y) - self.crpix;
        if let Some(forward) = &self.sip {
            offset = forward.apply(offset);
        }
        let iwc = self.cd * offset;
        let (xi, eta) = (iwc.x * RADEG, iwc.y * RADEG);
        let (ra0, dec0) = (self.crval.0 * RADEG, self.crval.1 * RADEG);

        let rho = xi.hypot(eta);
        if rho < 1e-15 {
            return (self.crval.0.rem_euclid(360.0), self.crval.1);
        }
        let c = rho.atan();
        let (sin_c, cos_c) = c.sin_cos();

        let dec = (cos_c * dec0.sin() + eta * sin_c * dec0.cos() / rho).asin();
        let ra = ra0 + (xi * sin_c).atan2(rho * dec0.cos() * cos_c - eta * dec0.sin() * sin_c);

        ((ra / RADEG).rem_euclid(360.0), dec / RADEG)
    }
}
