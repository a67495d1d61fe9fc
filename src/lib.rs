//! # ffiphot
//!
//! Aperture photometry of one target across a large collection of
//! full-frame sky images, processed in parallel.
//!
//! A run takes a download script (one fetch command per image), a positional
//! catalog of the sources around the target, and the target itself. Each
//! image is fetched into a private scratch directory, every catalog source in
//! its footprint is measured, and the row matching the target is stored as a
//! per-frame record. The records are later assembled into a light curve.
//!
//! ## Modules
//!
//! * [`catalog`]: catalog CSV reader and the shared LRU [`catalog::cache::CatalogCache`].
//! * [`frame`]: decoded images, TAN/SIP astrometry and the [`frame::FrameLoader`] seam.
//! * [`photometry`]: centroiding, aperture photometry and [`photometry::PhotometryParams`].
//! * [`selection`]: nearest-source target selection with an acceptance radius.
//! * [`fetch`]: download scripts and the [`fetch::ImageFetcher`] seam.
//! * [`worker`] / [`orchestrator`]: per-task pipeline and the parallel run.
//! * [`assembler`]: light curve reconstruction from the per-frame records.
//! * [`checkpoint`], `script_download` (feature `script-download`): run support.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ffiphot::{
//!     assembler::load_photometry_series,
//!     fetch::ShellFetcher,
//!     orchestrator::{process_images_parallel, PipelineConfig},
//!     target::Target,
//! };
//! # use ffiphot::frame::FrameLoader;
//! # async fn run(loader: Arc<dyn FrameLoader>) -> Result<(), ffiphot::ffiphot_errors::FfiphotError> {
//! let target = Target::from_sexagesimal("lambda Tau", "04 00 40.8", "+12 29 25").unwrap();
//! let config = PipelineConfig::new("tesscurl_sector_5_ffic.sh", "catalog.csv", "photometry");
//!
//! let cancel = tokio_util::sync::CancellationToken::new();
//! process_images_parallel(&config, &target, Arc::new(ShellFetcher::new()), loader, cancel).await?;
//!
//! let mut series = load_photometry_series(&config.output_dir, &target, 0.5)?;
//! series.sort_by_time();
//! # Ok(())
//! # }
//! ```
pub mod assembler;
pub mod catalog;
pub mod checkpoint;
pub mod constants;
pub mod conversion;
pub mod fetch;
pub mod ffiphot_errors;
pub mod frame;
pub mod frame_record;
pub mod logging;
pub mod orchestrator;
pub mod photometry;
pub mod progress;
#[cfg(feature = "script-download")]
pub mod script_download;
pub mod selection;
pub mod target;
pub mod time;
pub mod worker;
