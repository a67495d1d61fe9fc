//! # Parallel orchestrator
//!
//! Runs one worker task per pending script line, with at most `workers`
//! tasks in flight, and aggregates their outcomes in completion order.
//!
//! ## Execution model
//!
//! Workers are tokio tasks in a [`tokio::task::JoinSet`]. Fetching is
//! asynchronous; decoding and measuring run on the blocking pool (see
//! [`crate::worker`]). All workers share one [`CatalogCache`], loaded once
//! during start-up.
//!
//! ## Start-up faults
//!
//! A missing or empty script, an unreadable catalog and an output directory
//! that cannot be created are returned as errors before any task is
//! dispatched.
//!
//! ## Cancellation
//!
//! The run watches a [`CancellationToken`]. Once it fires, no task is
//! dispatched anymore, every in-flight task is aborted (dropping a task
//! kills its fetch subprocess and removes its scratch directory), and the
//! persist gate is taken exclusively so that blocking measurements still
//! running cannot write a record afterwards. The run then returns
//! [`RunOutcome::Cancelled`]. Processes map that outcome to
//! [`CANCELLED_EXIT_CODE`] and should not wait for the blocking pool
//! before exiting.
use std::{
    collections::BTreeSet,
    fmt,
    path::PathBuf,
    sync::Arc,
};

use tokio::{sync::RwLock, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    catalog::cache::CatalogCache,
    constants::DEFAULT_CATALOG_CACHE_CAPACITY,
    fetch::{FetchScript, ImageFetcher},
    ffiphot_errors::FfiphotError,
    frame::FrameLoader,
    photometry::PhotometryParams,
    progress::RunProgress,
    target::Target,
    worker::{process_task, TaskResult, WorkerShared},
};

/// Exit status of a process whose run was interrupted by the operator.
pub const CANCELLED_EXIT_CODE: i32 = 130;

/// Inputs and tunables of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub script_path: PathBuf,
    pub catalog_path: PathBuf,
    pub output_dir: PathBuf,
    /// First script line to process
    pub start_index: usize,
    /// Concurrent workers, `None` for the number of available CPUs
    pub workers: Option<usize>,
    /// Parent of the per-task scratch directories, `None` for the system temp dir
    pub scratch_root: Option<PathBuf>,
    pub cache_capacity: usize,
    pub params: PhotometryParams,
}

impl PipelineConfig {
    pub fn new(
        script_path: impl Into<PathBuf>,
        catalog_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        PipelineConfig {
            script_path: script_path.into(),
            catalog_path: catalog_path.into(),
            output_dir: output_dir.into(),
            start_index: 0,
            workers: None,
            scratch_root: None,
            cache_capacity: DEFAULT_CATALOG_CACHE_CAPACITY,
            params: PhotometryParams::default(),
        }
    }

    pub fn with_start_index(mut self, start_index: usize) -> Self {
        self.start_index = start_index;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_params(mut self, params: PhotometryParams) -> Self {
        self.params = params;
        self
    }

    /// Number of concurrent workers (at least one).
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// Counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Lowest script index not known to be finished; restarting from it
    /// redoes no finished task below it
    pub resume_index: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dispatched, {} succeeded, {} failed, resume at {}",
            self.dispatched, self.succeeded, self.failed, self.resume_index
        )
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    Cancelled(RunSummary),
}

impl RunOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::Completed(summary) | RunOutcome::Cancelled(summary) => summary,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled(_))
    }
}

/// Tracks the lowest unfinished index while tasks complete out of order.
#[derive(Debug)]
struct ResumeFrontier {
    next: usize,
    finished: BTreeSet<usize>,
}

impl ResumeFrontier {
    fn new(start: usize) -> Self {
        ResumeFrontier {
            next: start,
            finished: BTreeSet::new(),
        }
    }

    fn finish(&mut self, index: usize) {
        self.finished.insert(index);
        while self.finished.remove(&self.next) {
            self.next += 1;
        }
    }
}

/// Read the script, prepare the output directory and warm the catalog cache.
fn start_up(
    config: &PipelineConfig,
) -> Result<(FetchScript, Arc<CatalogCache>), FfiphotError> {
    let script = FetchScript::from_file(&config.script_path)?;
    std::fs::create_dir_all(&config.output_dir)?;

    let cache = Arc::new(CatalogCache::with_capacity(config.cache_capacity));
    let catalog = cache.load(&config.catalog_path)?;
    debug!(
        path = %config.catalog_path.display(),
        sources = catalog.len(),
        "catalog loaded"
    );
    Ok((script, cache))
}

/// Process every script line from `config.start_index` on, in parallel.
///
/// Arguments
/// -----------------
/// * `config`: paths, start index, worker count and photometry tunables.
/// * `target`: the object to measure.
/// * `fetcher`: runs the fetch commands.
/// * `loader`: decodes the fetched images.
/// * `cancel`: operator cancellation.
///
/// Return
/// ----------
/// * [`RunOutcome::Completed`] once every dispatched task has reported,
///   [`RunOutcome::Cancelled`] when `cancel` fired first, or a start-up error.
///
/// See also
/// ------------
/// * [`crate::worker::process_task`] – what each task does.
pub async fn process_images_parallel(
    config: &PipelineConfig,
    target: &Target,
    fetcher: Arc<dyn ImageFetcher>,
    loader: Arc<dyn FrameLoader>,
    cancel: CancellationToken,
) -> Result<RunOutcome, FfiphotError> {
    let (script, cache) = start_up(config).inspect_err(|e| {
        error!(error = %e, "run start-up failed");
    })?;

    let total = script.len();
    let workers = config.worker_count();
    let start = config.start_index.min(total);
    info!(
        target_name = target.name(),
        total,
        start,
        workers,
        output = %config.output_dir.display(),
        "starting run"
    );

    let shared = WorkerShared {
        script: Arc::new(script),
        catalog_path: config.catalog_path.clone(),
        cache,
        output_dir: config.output_dir.clone(),
        scratch_root: config.scratch_root.clone(),
        target: Arc::new(target.clone()),
        params: Arc::new(config.params.clone()),
        fetcher,
        loader,
        cancel: cancel.clone(),
        persist_gate: Arc::new(RwLock::new(())),
    };

    let mut pending = start..total;
    let mut in_flight: JoinSet<TaskResult> = JoinSet::new();
    let mut frontier = ResumeFrontier::new(start);
    let mut summary = RunSummary {
        resume_index: start,
        ..RunSummary::default()
    };
    let mut progress = RunProgress::new(total - start);

    loop {
        if cancel.is_cancelled() {
            return Ok(cancel_run(&mut in_flight, &shared, &frontier, summary, &progress).await);
        }

        while in_flight.len() < workers {
            let Some(index) = pending.next() else {
                break;
            };
            let task_shared = shared.clone();
            in_flight.spawn(async move { process_task(&task_shared, index).await });
            summary.dispatched += 1;
        }

        if in_flight.is_empty() {
            break;
        }

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                return Ok(cancel_run(&mut in_flight, &shared, &frontier, summary, &progress).await);
            }

            Some(joined) = in_flight.join_next() => {
                match joined {
                    Ok(result) => {
                        if result.success {
                            summary.succeeded += 1;
                        } else {
                            summary.failed += 1;
                        }
                        frontier.finish(result.index);
                        summary.resume_index = frontier.next;
                        progress.task_done(result.success);
                        debug!(index = result.index, success = result.success, "task finished");
                    }
                    // the index of a crashed task is unknown, so the frontier stays below it
                    Err(e) => {
                        warn!(error = %e, "worker task failed");
                        summary.failed += 1;
                        progress.task_done(false);
                    }
                }
            }
        }
    }

    progress.finish();
    summary.resume_index = total;
    info!(%summary, "run completed");
    Ok(RunOutcome::Completed(summary))
}

async fn cancel_run(
    in_flight: &mut JoinSet<TaskResult>,
    shared: &WorkerShared,
    frontier: &ResumeFrontier,
    mut summary: RunSummary,
    progress: &RunProgress,
) -> RunOutcome {
    in_flight.abort_all();
    // aborted tasks drop their scratch directories when reaped
    while in_flight.join_next().await.is_some() {}
    // waits for writes already past the token check; later ones see the token
    drop(shared.persist_gate.write().await);

    progress.interrupt();
    summary.resume_index = frontier.next;
    warn!(%summary, "run cancelled");
    RunOutcome::Cancelled(summary)
}
