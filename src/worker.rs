//! # Worker unit
//!
//! [`process_task`] handles one task of a run end to end:
//!
//! 1. create a private scratch directory (`ffiphot_*`),
//! 2. run the fetch command of the task's script line into it,
//! 3. pick the fetched image (first `*.fits` file by name),
//! 4. on a blocking thread: load the catalog (through the shared cache),
//!    decode the frame, extract the photometry and select the target,
//! 5. persist the accepted row to `<output_dir>/<image stem>.csv`,
//! 6. remove the scratch directory.
//!
//! Outcomes
//! -----------------
//! * No image fetched, no source in the footprint, or target beyond the
//!   acceptance radius: `success = false`, logged at `debug`.
//! * Any fault while measuring (unreadable image, catalog error, write error,
//!   panic of the blocking task): `success = false`, logged at `warn`.
//!
//! Nothing escapes as an error. The scratch directory is owned by a
//! [`tempfile::TempDir`], so it is removed on every return path, and also when
//! the task is aborted by a cancelled run.
//!
//! Cancellation
//! -----------------
//! Aborting a task does not stop its blocking half. That half checks the
//! run's cancellation token after decoding and again right before writing,
//! and writes only while holding a read guard of the run's persist gate.
//! The orchestrator takes the write side once the token has fired, so no
//! record appears after a cancelled run has returned.
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use itertools::Itertools;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    catalog::cache::CatalogCache,
    constants::{IMAGE_EXTENSION, SCRATCH_PREFIX},
    fetch::{FetchScript, ImageFetcher},
    ffiphot_errors::FfiphotError,
    frame::FrameLoader,
    frame_record::{record_path, write_records},
    photometry::{extract, PhotometryParams},
    selection::{select_target, TargetMatch},
    target::Target,
};

/// Outcome of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskResult {
    pub index: usize,
    pub success: bool,
}

/// State shared read-only by every worker of a run.
#[derive(Clone)]
pub struct WorkerShared {
    pub script: Arc<FetchScript>,
    pub catalog_path: PathBuf,
    pub cache: Arc<CatalogCache>,
    pub output_dir: PathBuf,
    pub scratch_root: Option<PathBuf>,
    pub target: Arc<Target>,
    pub params: Arc<PhotometryParams>,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub loader: Arc<dyn FrameLoader>,
    /// Fired when the run is cancelled
    pub cancel: CancellationToken,
    /// Shared by record writers, taken exclusively by a cancelling run
    pub persist_gate: Arc<RwLock<()>>,
}

/// First `*.fits` file of `dir`, in lexical order.
pub fn find_image(dir: &Path) -> Result<Option<PathBuf>, FfiphotError> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(IMAGE_EXTENSION));
        if is_image {
            images.push(path);
        }
    }
    Ok(images.into_iter().sorted().next())
}

fn create_scratch(root: Option<&Path>) -> std::io::Result<tempfile::TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX);
    match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
}

/// Measure one fetched image and persist the target row.
///
/// Return
/// ----------
/// * `Some(path)` of the written record, `None` when the target was not measured.
fn measure_frame(
    image: &Path,
    shared: &WorkerShared,
) -> Result<Option<PathBuf>, FfiphotError> {
    let catalog = shared.cache.load(&shared.catalog_path)?;
    let frame = shared.loader.load(image)?;
    if shared.cancel.is_cancelled() {
        debug!(image = %image.display(), "run cancelled, frame not measured");
        return Ok(None);
    }
    let records = extract(&frame, &catalog, &shared.params);
    if records.is_empty() {
        return Ok(None);
    }

    match select_target(&records, shared.target.as_ref(), shared.params.max_separation) {
        TargetMatch::Found { row, separation } => {
            let _persist = shared.persist_gate.blocking_read();
            if shared.cancel.is_cancelled() {
                debug!(image = %image.display(), "run cancelled, record dropped");
                return Ok(None);
            }
            let path = record_path(&shared.output_dir, image);
            write_records(&path, std::slice::from_ref(row))?;
            debug!(separation_arcsec = separation, source_id = %row.source_id, "target matched");
            Ok(Some(path))
        }
        TargetMatch::TooFar { separation, .. } => {
            debug!(separation_arcsec = separation, "nearest source beyond acceptance radius");
            Ok(None)
        }
        TargetMatch::Empty => Ok(None),
    }
}

/// Run task `index`: fetch, measure, select, persist.
///
/// Arguments
/// -----------------
/// * `shared`: run-wide state (script, catalog, target, output and collaborators).
/// * `index`: 0-based line of the fetch script.
///
/// Return
/// ----------
/// * The task outcome. Faults are logged and reported as `success = false`.
pub async fn process_task(shared: &WorkerShared, index: usize) -> TaskResult {
    let failure = TaskResult {
        index,
        success: false,
    };

    let Some(line) = shared.script.line(index) else {
        debug!(index, "index beyond the end of the script");
        return failure;
    };

    let scratch = match create_scratch(shared.scratch_root.as_deref()) {
        Ok(dir) => dir,
        Err(e) => {
            warn!(index, error = %e, "unable to create scratch directory");
            return failure;
        }
    };

    let success = run_in_scratch(shared, index, line, scratch.path()).await;

    let scratch_path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(index, path = %scratch_path.display(), error = %e, "scratch directory not removed");
        }
    }

    TaskResult { index, success }
}

async fn run_in_scratch(shared: &WorkerShared, index: usize, line: &str, scratch: &Path) -> bool {
    if let Err(e) = shared.fetcher.fetch(line, scratch).await {
        warn!(index, line, error = %e, "fetch failed");
    }

    let image = match find_image(scratch) {
        Ok(Some(image)) => image,
        Ok(None) => {
            debug!(index, line, "no image fetched");
            return false;
        }
        Err(e) => {
            warn!(index, error = %e, "unable to list scratch directory");
            return false;
        }
    };

    let blocking_shared = shared.clone();
    let blocking_image = image.clone();
    let measured =
        tokio::task::spawn_blocking(move || measure_frame(&blocking_image, &blocking_shared)).await;

    match measured {
        Ok(Ok(Some(record))) => {
            info!(index, path = %record.display(), "photometry saved");
            true
        }
        Ok(Ok(None)) => {
            debug!(index, image = %image.display(), "target not measured");
            false
        }
        Ok(Err(e)) => {
            warn!(index, image = %image.display(), error = %e, "frame processing failed");
            false
        }
        Err(e) => {
            warn!(index, image = %image.display(), error = %e, "frame processing panicked");
            false
        }
    }
}

#[cfg(test)]
mod worker_test {
    use super::*;

    #[test]
    fn test_find_image_picks_first_fits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.fits"), b"").unwrap();
        std::fs::write(dir.path().join("a.FITS"), b"").unwrap();
        std::fs::write(dir.path().join("0.txt"), b"").unwrap();

        let found = find_image(dir.path()).unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "a.FITS");
    }

    #[test]
    fn test_find_image_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested.fits")).unwrap();
        assert_eq!(find_image(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_scratch_prefix_and_root() {
        let root = tempfile::tempdir().unwrap();
        let scratch = create_scratch(Some(root.path())).unwrap();
        assert!(scratch.path().starts_with(root.path()));
        let name = scratch.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(SCRATCH_PREFIX));
    }
}
