//! # Per-frame photometry records
//!
//! A [`FrameRecord`] is one measured catalog source of one frame. Workers
//! persist the selected target row of each frame to its own CSV file, named
//! after the source image (`<stem>.csv`), and the series assembler reads
//! those files back.
//!
//! ## File format
//!
//! ```text
//! flux,mag,mag_err,flux_err,RA,DEC,ID,DATE-OBS
//! 15234.2,9.9823,0.0004,6.41,60.17,12.49,3302846072717868416,2021-01-01T00:00:00
//! ```
//!
//! Non-finite values are written as `NaN` / `inf` and read back unchanged.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    constants::{Degree, RECORD_EXTENSION},
    ffiphot_errors::FfiphotError,
};

/// Measurement of one catalog source in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub flux: f64,
    pub mag: f64,
    pub mag_err: f64,
    pub flux_err: f64,
    #[serde(rename = "RA")]
    pub ra: Degree,
    #[serde(rename = "DEC")]
    pub dec: Degree,
    #[serde(rename = "ID")]
    pub source_id: String,
    #[serde(rename = "DATE-OBS")]
    pub date_obs: String,
}

/// Path of the record file produced for `image`: `<output_dir>/<image stem>.csv`.
pub fn record_path(output_dir: &Path, image: &Path) -> PathBuf {
    let stem = image.file_stem().unwrap_or(image.as_os_str());
    output_dir.join(format!("{}.{RECORD_EXTENSION}", stem.to_string_lossy()))
}

/// Write `records` to `path`, replacing any existing file.
pub fn write_records(path: &Path, records: &[FrameRecord]) -> Result<(), FfiphotError> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read every row of the record file at `path`.
pub fn read_records(path: &Path) -> Result<Vec<FrameRecord>, FfiphotError> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader
        .deserialize::<FrameRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

#[cfg(test)]
mod frame_record_test {
    use super::*;

    fn record(flux: f64) -> FrameRecord {
        FrameRecord {
            flux,
            mag: 20.0 - 2.5 * flux.abs().log10(),
            mag_err: 0.01,
            flux_err: 3.0,
            ra: 60.17,
            dec: 12.49,
            source_id: "3302846072717868416".into(),
            date_obs: "2021-01-01T00:00:00".into(),
        }
    }

    #[test]
    fn test_record_path() {
        let path = record_path(
            Path::new("/out"),
            Path::new("/scratch/tess2018206192942-s0001-1-1-0120-s_ffic.fits"),
        );
        assert_eq!(
            path,
            PathBuf::from("/out/tess2018206192942-s0001-1-1-0120-s_ffic.csv")
        );
    }

    #[test]
    fn test_header_and_non_finite_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.csv");
        write_records(&path, &[record(0.0)]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("flux,mag,mag_err,flux_err,RA,DEC,ID,DATE-OBS\n"));

        let back = read_records(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].flux, 0.0);
        assert!(back[0].mag.is_infinite());
        assert_eq!(back[0].source_id, "3302846072717868416");
    }

    #[test]
    fn test_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.csv");
        write_records(&path, &[record(1.0), record(2.0)]).unwrap();
        write_records(&path, &[record(3.0)]).unwrap();

        let back = read_records(&path).unwrap();
        assert_eq!(back, vec![record(3.0)]);
    }
}
