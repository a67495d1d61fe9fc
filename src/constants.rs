//! # Constants and type definitions for ffiphot
//!
//! This module centralizes the **photometric defaults**, **angular conversion factors**, and
//! **common type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Angular conversions (degrees ↔ radians ↔ arcseconds)
//! - Default aperture photometry configuration (TESS full-frame images)
//! - File-naming conventions shared by the worker and the series assembler
//! - Core type aliases used across the crate

// -------------------------------------------------------------------------------------------------
// Angular conversions
// -------------------------------------------------------------------------------------------------

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds per degree
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// Conversion factor between Julian Date and Modified Julian Date
pub const JDTOMJD: f64 = 2400000.5;

// -------------------------------------------------------------------------------------------------
// Photometry defaults
// -------------------------------------------------------------------------------------------------

/// Radius of the circular measurement aperture (pixels)
pub const DEFAULT_APERTURE_RADIUS: f64 = 10.0;

/// Inner radius of the background annulus (pixels)
pub const DEFAULT_ANNULUS_INNER: f64 = 12.0;

/// Outer radius of the background annulus (pixels)
pub const DEFAULT_ANNULUS_OUTER: f64 = 14.0;

/// Instrumental zeropoint of the magnitude scale
pub const DEFAULT_ZEROPOINT: f64 = 20.4402281476;

/// Nominal TESS full-frame gain (e⁻/ADU)
pub const DEFAULT_GAIN: f64 = 5.22;

/// Side of the centroid search window (pixels)
pub const DEFAULT_CENTROID_BOX: usize = 3;

/// Clipping threshold of the robust background noise estimate (σ)
pub const DEFAULT_CLIP_SIGMA: f64 = 3.0;

/// Maximum clipping iterations of the robust background noise estimate
pub const DEFAULT_CLIP_ITERS: usize = 5;

/// Default acceptance radius around the target (arcseconds)
pub const DEFAULT_MAX_SEPARATION: ArcSec = 0.5;

/// 2.5 / ln(10), converts a relative flux error into a magnitude error
pub const MAG_ERR_FACTOR: f64 = 1.0857;

/// Default number of distinct catalogs retained by a [`crate::catalog::cache::CatalogCache`]
pub const DEFAULT_CATALOG_CACHE_CAPACITY: usize = 128;

// -------------------------------------------------------------------------------------------------
// File conventions
// -------------------------------------------------------------------------------------------------

/// Extension of the image product fetched by each task
pub const IMAGE_EXTENSION: &str = "fits";

/// Extension of the per-frame record files
pub const RECORD_EXTENSION: &str = "csv";

/// Prefix of the per-task scratch directories
pub const SCRATCH_PREFIX: &str = "ffiphot_";

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;

/// Angle in arcseconds
pub type ArcSec = f64;

/// Julian date (days, UTC)
pub type JulianDate = f64;

/// Position on the pixel grid (x = column, y = row), 0-based
pub type PixelPos = (f64, f64);
