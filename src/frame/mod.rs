//! # Calibrated image frames
//!
//! A [`Frame`] is the in-memory form of one fetched image product: the pixel
//! array, its astrometric solution ([`wcs::Wcs`]) and the nominal observation
//! timestamp read from the `DATE-OBS` header keyword.
//!
//! Decoding is abstracted behind the [`FrameLoader`] trait so the pipeline
//! does not depend on a particular file format library. The FITS
//! implementation lives in [`fits_loader`] and is compiled with the `fits`
//! feature (it links against cfitsio).
//!
//! ## Pixel conventions
//!
//! * `pixels` is indexed `[[y, x]]` (row-major, rows = y).
//! * `width()` is the number of columns, `height()` the number of rows.
//! * A position `(x, y)` is **in frame** iff `0 ≤ x < width` and `0 ≤ y < height`.
use std::path::Path;

use ndarray::Array2;

use crate::{constants::PixelPos, ffiphot_errors::FfiphotError};

pub mod wcs;

#[cfg(feature = "fits")]
pub mod fits_loader;

use wcs::Wcs;

/// One decoded image product.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pixels: Array2<f64>,
    pub wcs: Wcs,
    /// Raw `DATE-OBS` header value, empty when the header lacks it
    pub date_obs: String,
}

impl Frame {
    pub fn new(pixels: Array2<f64>, wcs: Wcs, date_obs: impl Into<String>) -> Self {
        Frame {
            pixels,
            wcs,
            date_obs: date_obs.into(),
        }
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    /// Whether a pixel position lies inside `[0, width) × [0, height)`.
    pub fn contains(&self, (x, y): PixelPos) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width() as f64 && y < self.height() as f64
    }
}

/// Decoder of fetched image files.
///
/// Implementations are shared by every worker of a run and are called from
/// blocking threads, hence the `Send + Sync` bound.
pub trait FrameLoader: Send + Sync + 'static {
    /// Decode the image file at `path`.
    ///
    /// Return
    /// ----------
    /// * The decoded frame, or an error describing why the file is unusable.
    ///   The worker treats any error as a per-frame fault.
    fn load(&self, path: &Path) -> Result<Frame, FfiphotError>;
}

#[cfg(test)]
mod frame_test {
    use super::*;

    #[test]
    fn test_footprint_bounds() {
        let wcs = Wcs::tan((0.0, 0.0), (0.0, 0.0), [[1.0, 0.0], [0.0, 1.0]]);
        let frame = Frame::new(Array2::zeros((20, 30)), wcs, "");
        assert_eq!(frame.width(), 30);
        assert_eq!(frame.height(), 20);

        assert!(frame.contains((0.0, 0.0)));
        assert!(frame.contains((29.99, 19.99)));
        assert!(!frame.contains((30.0, 5.0)));
        assert!(!frame.contains((5.0, 20.0)));
        assert!(!frame.contains((-0.01, 5.0)));
        assert!(!frame.contains((f64::NAN, 5.0)));
    }
}
