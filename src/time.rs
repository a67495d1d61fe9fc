use hifitime::Epoch;
use std::str::FromStr;

use crate::{
    constants::{JulianDate, JDTOMJD},
    ffiphot_errors::FfiphotError,
};

/// Transformation from an image DATE-OBS value (`YYYY-MM-ddTHH:mm:ss[.fff]`, UTC) to julian date (JD)
///
/// Argument
/// --------
/// * `date_obs`: the observation timestamp as written in the image header
///
/// Return
/// ------
/// * the julian date (UTC), or [`FfiphotError::InvalidDateObs`] if the value cannot be parsed
pub fn date_obs_to_jd(date_obs: &str) -> Result<JulianDate, FfiphotError> {
    let trimmed = date_obs.trim();
    let epoch = Epoch::from_str(trimmed)
        .map_err(|e| FfiphotError::InvalidDateObs(format!("{trimmed:?}: {e}")))?;
    Ok(epoch.to_jde_utc_days())
}

/// Transformation from julian date (JD) in modified julian date (MJD)
///
/// Argument
/// --------
/// * `jd`: a slice of JD
///
/// Return
/// ------
/// * a vector of MJD
pub fn jd_to_mjd(jd: &[f64]) -> Vec<f64> {
    jd.iter().map(|x| x - JDTOMJD).collect()
}

#[cfg(test)]
mod time_test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_date_obs_to_jd() {
        let jd = date_obs_to_jd("2021-01-01T00:00:00").unwrap();
        assert_abs_diff_eq!(jd, 2459215.5, epsilon = 1e-9);

        let jd = date_obs_to_jd("2021-01-01T12:00:00.000").unwrap();
        assert_abs_diff_eq!(jd, 2459216.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_date_obs() {
        assert!(matches!(
            date_obs_to_jd(""),
            Err(FfiphotError::InvalidDateObs(_))
        ));
        assert!(matches!(
            date_obs_to_jd("yesterday"),
            Err(FfiphotError::InvalidDateObs(_))
        ));
    }

    #[test]
    fn test_jd_to_mjd() {
        let mjd = jd_to_mjd(&[2459215.5, 2459216.5]);
        assert_eq!(mjd, vec![59215.0, 59216.0]);
    }
}
