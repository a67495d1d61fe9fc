//! # Frame photometry
//!
//! Measures every catalog source that falls inside one frame:
//!
//! 1. **Projection**: each catalog position is projected through the frame's
//!    astrometric solution; entries outside `[0, width) × [0, height)` are
//!    ignored, and a projection failure only skips that entry.
//! 2. **Centroiding**: in-frame positions are refined by [`centroid::centroid_com`];
//!    an entry whose centroid is undefined is dropped.
//! 3. **Aperture photometry**: [`aperture::measure_aperture`] sums a circular
//!    aperture and estimates the local background in a concentric annulus.
//! 4. **Calibration**: the net flux gives the instrumental magnitude
//!    `zeropoint − 2.5·log10(|flux|)` and the uncertainties
//!
//! ```text
//! σ_flux = sqrt(|flux| / gain + A_ap·σ_bg² + A_ap·σ_bg² / A_ann)
//! σ_mag  = 1.0857 · σ_flux / |flux|
//! ```
//!
//! where `σ_bg` is the sigma-clipped standard deviation of the whole frame
//! ([`background::sigma_clipped_stats`]).
//!
//! A net flux of exactly zero yields a non-finite magnitude and magnitude
//! error. This is deliberate: such rows are kept and flow through selection
//! unchanged.
//!
//! Configuration
//! -----------------
//! All tunables live in [`PhotometryParams`], built with
//! [`PhotometryParams::builder`] when the defaults need to change.
use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;

use tracing::{debug, trace};

use crate::{
    catalog::CatalogEntry,
    constants::{
        ArcSec, DEFAULT_ANNULUS_INNER, DEFAULT_ANNULUS_OUTER, DEFAULT_APERTURE_RADIUS,
        DEFAULT_CENTROID_BOX, DEFAULT_CLIP_ITERS, DEFAULT_CLIP_SIGMA, DEFAULT_GAIN,
        DEFAULT_MAX_SEPARATION, DEFAULT_ZEROPOINT, MAG_ERR_FACTOR,
    },
    ffiphot_errors::FfiphotError,
    frame::Frame,
    frame_record::FrameRecord,
};

pub mod aperture;
pub mod background;
pub mod centroid;

use aperture::{measure_aperture, ApertureShape};
use background::sigma_clipped_stats;
use centroid::centroid_com;

/// Tunables of the per-frame measurement and of the target selection.
///
/// Default values (TESS full-frame images):
///
/// * `aperture_radius`: 10 px
/// * `annulus_inner`: 12 px
/// * `annulus_outer`: 14 px
/// * `zeropoint`: 20.4402281476
/// * `gain`: 5.22 e⁻/ADU
/// * `centroid_box`: 3 px
/// * `clip_sigma`: 3σ
/// * `clip_iters`: 5
/// * `max_separation`: 0.5″
#[derive(Debug, Clone, PartialEq)]
pub struct PhotometryParams {
    pub aperture_radius: f64,
    pub annulus_inner: f64,
    pub annulus_outer: f64,
    pub zeropoint: f64,
    pub gain: f64,
    pub centroid_box: usize,
    pub clip_sigma: f64,
    pub clip_iters: usize,
    pub max_separation: ArcSec,
}

impl Default for PhotometryParams {
    fn default() -> Self {
        PhotometryParams {
            aperture_radius: DEFAULT_APERTURE_RADIUS,
            annulus_inner: DEFAULT_ANNULUS_INNER,
            annulus_outer: DEFAULT_ANNULUS_OUTER,
            zeropoint: DEFAULT_ZEROPOINT,
            gain: DEFAULT_GAIN,
            centroid_box: DEFAULT_CENTROID_BOX,
            clip_sigma: DEFAULT_CLIP_SIGMA,
            clip_iters: DEFAULT_CLIP_ITERS,
            max_separation: DEFAULT_MAX_SEPARATION,
        }
    }
}

impl PhotometryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a validating builder initialised with the defaults.
    ///
    /// ```rust,no_run
    /// use ffiphot::photometry::PhotometryParams;
    ///
    /// let params = PhotometryParams::builder()
    ///     .aperture_radius(3.0)
    ///     .annulus(5.0, 8.0)
    ///     .max_separation(2.0)
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder() -> PhotometryParamsBuilder {
        PhotometryParamsBuilder::new()
    }

    pub(crate) fn aperture_shape(&self) -> ApertureShape {
        ApertureShape {
            radius: self.aperture_radius,
            annulus_inner: self.annulus_inner,
            annulus_outer: self.annulus_outer,
        }
    }
}

impl fmt::Display for PhotometryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "aperture r={} px, annulus [{}, {}) px, zp={}, gain={}, box={} px, clip {}σ×{}, max sep {}\"",
            self.aperture_radius,
            self.annulus_inner,
            self.annulus_outer,
            self.zeropoint,
            self.gain,
            self.centroid_box,
            self.clip_sigma,
            self.clip_iters,
            self.max_separation
        )
    }
}

/// Fluent builder for [`PhotometryParams`].
#[derive(Debug, Clone, Default)]
pub struct PhotometryParamsBuilder {
    params: PhotometryParams,
}

impl PhotometryParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aperture_radius(mut self, v: f64) -> Self {
        self.params.aperture_radius = v;
        self
    }

    /// Inner and outer radius of the background annulus.
    pub fn annulus(mut self, inner: f64, outer: f64) -> Self {
        self.params.annulus_inner = inner;
        self.params.annulus_outer = outer;
        self
    }

    pub fn zeropoint(mut self, v: f64) -> Self {
        self.params.zeropoint = v;
        self
    }

    pub fn gain(mut self, v: f64) -> Self {
        self.params.gain = v;
        self
    }

    pub fn centroid_box(mut self, v: usize) -> Self {
        self.params.centroid_box = v;
        self
    }

    pub fn clip_sigma(mut self, v: f64) -> Self {
        self.params.clip_sigma = v;
        self
    }

    pub fn clip_iters(mut self, v: usize) -> Self {
        self.params.clip_iters = v;
        self
    }

    pub fn max_separation(mut self, v: ArcSec) -> Self {
        self.params.max_separation = v;
        self
    }

    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    #[inline]
    fn lt(a: f64, b: f64) -> bool {
        a.partial_cmp(&b) == Some(Less)
    }

    /// Validate and produce the parameters.
    ///
    /// Validation rules
    /// -----------------
    /// * `aperture_radius > 0`
    /// * `0 < annulus_inner < annulus_outer`
    /// * `gain > 0`
    /// * `centroid_box` odd and ≥ 1
    /// * `clip_sigma > 0`, `clip_iters ≥ 1`
    /// * `zeropoint` finite
    /// * `max_separation ≥ 0`
    ///
    /// Return
    /// ----------
    /// * The parameters, or [`FfiphotError::InvalidPhotometryParameter`] naming the first broken rule.
    pub fn build(self) -> Result<PhotometryParams, FfiphotError> {
        let p = &self.params;

        if !Self::gt0(p.aperture_radius) || p.aperture_radius.is_infinite() {
            return Err(FfiphotError::InvalidPhotometryParameter(
                "aperture_radius must be > 0".into(),
            ));
        }
        if !(Self::gt0(p.annulus_inner)
            && Self::lt(p.annulus_inner, p.annulus_outer)
            && p.annulus_outer.is_finite())
        {
            return Err(FfiphotError::InvalidPhotometryParameter(
                "require 0 < annulus_inner < annulus_outer".into(),
            ));
        }
        if !Self::gt0(p.gain) {
            return Err(FfiphotError::InvalidPhotometryParameter(
                "gain must be > 0".into(),
            ));
        }
        if p.centroid_box % 2 == 0 {
            return Err(FfiphotError::InvalidPhotometryParameter(
                "centroid_box must be odd and >= 1".into(),
            ));
        }
        if !Self::gt0(p.clip_sigma) {
            return Err(FfiphotError::InvalidPhotometryParameter(
                "clip_sigma must be > 0".into(),
            ));
        }
        if p.clip_iters == 0 {
            return Err(FfiphotError::InvalidPhotometryParameter(
                "clip_iters must be >= 1".into(),
            ));
        }
        if !p.zeropoint.is_finite() {
            return Err(FfiphotError::InvalidPhotometryParameter(
                "zeropoint must be finite".into(),
            ));
        }
        if !Self::ge0(p.max_separation) {
            return Err(FfiphotError::InvalidPhotometryParameter(
                "max_separation must be >= 0".into(),
            ));
        }

        Ok(self.params)
    }
}

/// Instrumental magnitude of a net flux.
///
/// A zero flux gives `+inf` and a NaN flux gives NaN; neither is special-cased.
#[inline]
pub fn instrumental_magnitude(flux: f64, zeropoint: f64) -> f64 {
    zeropoint - 2.5 * flux.abs().log10()
}

/// Flux uncertainty combining shot noise, aperture background noise and
/// background estimation noise.
///
/// Arguments
/// -----------------
/// * `flux`: net flux.
/// * `gain`: detector gain (e⁻/ADU).
/// * `sigma_bg`: per-pixel background noise.
/// * `aperture_area`, `annulus_area`: pixel counts of the two regions.
#[inline]
pub fn flux_uncertainty(
    flux: f64,
    gain: f64,
    sigma_bg: f64,
    aperture_area: f64,
    annulus_area: f64,
) -> f64 {
    let bg_var = aperture_area * sigma_bg * sigma_bg;
    (flux.abs() / gain + bg_var + bg_var / annulus_area).sqrt()
}

/// Magnitude uncertainty from the flux and its uncertainty.
#[inline]
pub fn magnitude_uncertainty(flux: f64, flux_err: f64) -> f64 {
    MAG_ERR_FACTOR * flux_err / flux.abs()
}

/// Measure every catalog source that falls inside `frame`.
///
/// Arguments
/// -----------------
/// * `frame`: decoded image with its astrometric solution and timestamp.
/// * `catalog`: catalog entries, in catalog order.
/// * `params`: photometry tunables.
///
/// Return
/// ----------
/// * One [`FrameRecord`] per in-frame entry whose centroid could be refined,
///   in catalog order. Empty when nothing is measurable; this is not an error.
///
/// See also
/// ------------
/// * [`crate::selection::select_target`] – picks the target among the returned rows.
pub fn extract(
    frame: &Frame,
    catalog: &[CatalogEntry],
    params: &PhotometryParams,
) -> Vec<FrameRecord> {
    let in_frame: Vec<(&CatalogEntry, (f64, f64))> = catalog
        .iter()
        .filter_map(|entry| match frame.wcs.sky_to_pixel(entry.ra, entry.dec) {
            Ok(pixel) if frame.contains(pixel) => Some((entry, pixel)),
            Ok(_) => None,
            Err(e) => {
                trace!(source_id = %entry.source_id, error = %e, "catalog entry skipped");
                None
            }
        })
        .collect();

    if in_frame.is_empty() {
        debug!("no catalog source inside the frame footprint");
        return Vec::new();
    }

    let image = frame.pixels.view();
    let sigma_bg = sigma_clipped_stats(image.iter().copied(), params.clip_sigma, params.clip_iters)
        .map_or(f64::NAN, |stats| stats.std);
    let shape = params.aperture_shape();

    in_frame
        .into_iter()
        .filter_map(|(entry, pixel)| {
            let Some(center) = centroid_com(&image, pixel, params.centroid_box) else {
                trace!(source_id = %entry.source_id, "undefined centroid, entry dropped");
                return None;
            };
            let sums = measure_aperture(&image, center, &shape);
            let flux = sums.net_flux();
            let flux_err = flux_uncertainty(
                flux,
                params.gain,
                sigma_bg,
                sums.aperture_area,
                sums.annulus_area,
            );

            Some(FrameRecord {
                flux,
                mag: instrumental_magnitude(flux, params.zeropoint),
                mag_err: magnitude_uncertainty(flux, flux_err),
                flux_err,
                ra: entry.ra,
                dec: entry.dec,
                source_id: entry.source_id.clone(),
                date_obs: frame.date_obs.clone(),
            })
        })
        .collect()
}
