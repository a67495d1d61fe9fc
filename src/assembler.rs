//! # Light curve assembly
//!
//! Rebuilds the photometry series of a target from a directory of per-frame
//! record files written by the workers.
//!
//! Each `*.csv` file of the directory is handled on its own, in lexical file
//! name order: all its rows are read, the target row is selected with
//! [`select_target`] and, when accepted, its `(DATE-OBS → JD, flux)` pair is
//! appended to the series. Files may hold zero, one or many rows.
//!
//! A file that cannot be read, or whose accepted row has an unparsable
//! `DATE-OBS`, is skipped with a warning. The result follows file order;
//! call [`LightCurve::sort_by_time`] when time order is needed.
use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::{
    constants::{ArcSec, RECORD_EXTENSION},
    ffiphot_errors::FfiphotError,
    frame_record::read_records,
    selection::{select_target, SkyPosition, TargetMatch},
    target::LightCurve,
    time::date_obs_to_jd,
};

/// Record files (`*.csv`) of `dir`, sorted by file name.
pub fn record_files(dir: &Path) -> Result<Vec<PathBuf>, FfiphotError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
            files.push(path);
        }
    }
    Ok(files.into_iter().sorted().collect())
}

/// Assemble the light curve of `target` from the record files of `dir`.
///
/// Arguments
/// -----------------
/// * `dir`: directory holding the per-frame record files.
/// * `target`: anything with the target's sky position.
/// * `max_separation`: acceptance radius in arcseconds.
///
/// Return
/// ----------
/// * The `(JD, flux)` series in file order, or [`FfiphotError::NoData`] when the
///   directory holds no record file or no file yields an accepted row.
pub fn load_photometry_series<P>(
    dir: &Path,
    target: &P,
    max_separation: ArcSec,
) -> Result<LightCurve, FfiphotError>
where
    P: SkyPosition + ?Sized,
{
    let files = record_files(dir)?;
    if files.is_empty() {
        return Err(FfiphotError::NoData(format!(
            "no frame record files in {}",
            dir.display()
        )));
    }

    let mut series = LightCurve::new();
    for file in &files {
        let rows = match read_records(file) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "unreadable frame record skipped");
                continue;
            }
        };

        match select_target(&rows, target, max_separation) {
            TargetMatch::Found { row, .. } => match date_obs_to_jd(&row.date_obs) {
                Ok(jd) => series.push(jd, row.flux),
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "frame record with invalid DATE-OBS skipped");
                }
            },
            TargetMatch::TooFar { separation, .. } => {
                debug!(path = %file.display(), separation_arcsec = separation, "target not in frame record");
            }
            TargetMatch::Empty => {
                debug!(path = %file.display(), "empty frame record");
            }
        }
    }

    if series.is_empty() {
        return Err(FfiphotError::NoData(format!(
            "no frame record in {} matches the target within {max_separation}\"",
            dir.display()
        )));
    }
    info!(points = series.len(), files = files.len(), "light curve assembled");
    Ok(series)
}
