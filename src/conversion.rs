use crate::constants::{ArcSec, Degree, ARCSEC_PER_DEG, RADEG};

/// Parse a right ascension string to degrees
///
/// Arguments
/// ---------
/// * `ra`: a string representing the right ascension in the format `HH MM SS.SS`
///   (space or colon separated)
///
/// Returns
/// -------
/// * `Option<Degree>`: the right ascension in degrees, `None` if the input format is invalid.
pub(crate) fn parse_ra_to_deg(ra: &str) -> Option<Degree> {
    let parts: Vec<&str> = ra.split([' ', ':']).filter(|p| !p.is_empty()).collect();
    if parts.len() != 3 {
        return None;
    }

    let h: f64 = parts[0].parse().ok()?;
    let m: f64 = parts[1].parse().ok()?;
    let s: f64 = parts[2].parse().ok()?;

    Some((h + m / 60.0 + s / 3600.0) * 15.0)
}

/// Parse a declination string to degrees
///
/// Arguments
/// ---------
/// * `dec`: a string representing the declination in the format `±DD MM SS.SS`
///   (space or colon separated)
///
/// Returns
/// -------
/// * `Option<Degree>`: the declination in degrees, `None` if the input format is invalid.
pub(crate) fn parse_dec_to_deg(dec: &str) -> Option<Degree> {
    let parts: Vec<&str> = dec.split([' ', ':']).filter(|p| !p.is_empty()).collect();
    if parts.len() != 3 {
        return None;
    }

    let sign = if parts[0].starts_with('-') { -1.0 } else { 1.0 };
    let d: f64 = parts[0].trim_start_matches(&['-', '+'][..]).parse().ok()?;
    let m: f64 = parts[1].parse().ok()?;
    let s: f64 = parts[2].parse().ok()?;

    Some(sign * (d + m / 60.0 + s / 3600.0))
}

/// Convert arcseconds to degrees
#[inline]
pub fn arcsec_to_deg(arcsec: ArcSec) -> Degree {
    arcsec / ARCSEC_PER_DEG
}

/// Convert degrees to arcseconds
#[inline]
pub fn deg_to_arcsec(deg: Degree) -> ArcSec {
    deg * ARCSEC_PER_DEG
}

/// Great-circle angular distance between two sky positions.
///
/// Uses the Vincenty formula, which stays accurate for both tiny and
/// antipodal separations (the haversine form loses precision near π and
/// the plain cosine form near 0).
///
/// Arguments
/// ---------
/// * `ra1`, `dec1`: first position (degrees)
/// * `ra2`, `dec2`: second position (degrees)
///
/// Return
/// ------
/// * The separation in **arcseconds**. Non-finite inputs give a NaN separation.
pub fn angular_separation(ra1: Degree, dec1: Degree, ra2: Degree, dec2: Degree) -> ArcSec {
    let (sin_d1, cos_d1) = (dec1 * RADEG).sin_cos();
    let (sin_d2, cos_d2) = (dec2 * RADEG).sin_cos();
    let (sin_dra, cos_dra) = ((ra2 - ra1) * RADEG).sin_cos();

    let num1 = cos_d2 * sin_dra;
    let num2 = cos_d1 * sin_d2 - sin_d1 * cos_d2 * cos_dra;
    let denominator = sin_d1 * sin_d2 + cos_d1 * cos_d2 * cos_dra;

    let sep_rad = num1.hypot(num2).atan2(denominator);
    deg_to_arcsec(sep_rad / RADEG)
}

#[cfg(test)]
mod conversion_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ra_to_deg() {
        assert_eq!(parse_ra_to_deg("22 52 23.37"), Some(343.097375));
        assert_eq!(parse_ra_to_deg("04 41 04.77"), Some(70.269875));
        assert_eq!(parse_ra_to_deg("04:41:04.77"), Some(70.269875));
        assert_eq!(parse_ra_to_deg("1 2 3.4.5"), None);
        assert_eq!(parse_ra_to_deg("1 2"), None);
    }

    #[test]
    fn test_dec_to_deg() {
        assert_eq!(parse_dec_to_deg("-00 30 14.2"), Some(-0.5039444444444444));
        assert_eq!(parse_dec_to_deg("+13 55 42.7"), Some(13.928527777777777));
        assert_eq!(parse_dec_to_deg("89 15 50.2.3"), None);
        assert_eq!(parse_dec_to_deg("89 15"), None);
    }

    #[test]
    fn test_separation_along_meridian() {
        let sep = angular_separation(60.0, 12.0, 60.0, 12.0 + arcsec_to_deg(0.2));
        assert_relative_eq!(sep, 0.2, max_relative = 1e-6);
    }

    #[test]
    fn test_separation_scales_ra_with_cos_dec() {
        // one degree of RA at dec = 60° is half a degree on the sky
        let sep = angular_separation(10.0, 60.0, 11.0, 60.0);
        assert_relative_eq!(sep, 1800.0, max_relative = 1e-3);
    }

    #[test]
    fn test_separation_edge_cases() {
        assert_eq!(angular_separation(123.4, -45.6, 123.4, -45.6), 0.0);
        let antipode = angular_separation(0.0, 0.0, 180.0, 0.0);
        assert_relative_eq!(antipode, 180.0 * 3600.0, max_relative = 1e-12);
        assert!(angular_separation(f64::NAN, 0.0, 0.0, 0.0).is_nan());
    }
}
