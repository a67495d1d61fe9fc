#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use ffiphot::{
    catalog::CatalogEntry,
    constants::Degree,
    fetch::{FetchFuture, ImageFetcher},
    ffiphot_errors::FfiphotError,
    frame::{wcs::Wcs, Frame, FrameLoader},
};
use ndarray::Array2;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

/// Sky position of the reference pixel of every synthetic frame.
pub const FIELD_CENTER: (Degree, Degree) = (60.0, 12.0);

/// Plate scale of the synthetic frames, close to the TESS one (arcsec/pixel).
pub const PLATE_SCALE: f64 = 21.0;

/// TAN solution with `FIELD_CENTER` on pixel `center`, RA growing towards -x.
pub fn tess_wcs(center: (f64, f64)) -> Wcs {
    let scale = PLATE_SCALE / 3600.0;
    Wcs::tan(center, FIELD_CENTER, [[-scale, 0.0], [0.0, scale]])
}

/// Frame with a flat `background` and Gaussian sources `(x, y, flux)`.
///
/// Each source is normalized by its discrete sum over the frame, so the
/// pixels it adds total exactly `flux` (up to rounding).
pub fn synthetic_frame(
    width: usize,
    height: usize,
    background: f64,
    sources: &[(f64, f64, f64)],
    psf_sigma: f64,
    date_obs: &str,
) -> Frame {
    let mut pixels = Array2::from_elem((height, width), background);
    for &(sx, sy, flux) in sources {
        let profile = Array2::from_shape_fn((height, width), |(row, col)| {
            let dx = col as f64 - sx;
            let dy = row as f64 - sy;
            (-(dx * dx + dy * dy) / (2.0 * psf_sigma * psf_sigma)).exp()
        });
        let norm = profile.sum();
        pixels.scaled_add(flux / norm, &profile);
    }
    let center = ((width / 2) as f64, (height / 2) as f64);
    Frame::new(pixels, tess_wcs(center), date_obs)
}

/// Catalog entry sitting exactly on pixel `(x, y)` of `frame`.
pub fn entry_at(frame: &Frame, x: f64, y: f64, source_id: &str) -> CatalogEntry {
    let (ra, dec) = frame.wcs.pixel_to_sky(x, y);
    CatalogEntry::new(ra, dec, source_id)
}

/// Write a catalog CSV file and return its path.
pub fn write_catalog(dir: &Path, entries: &[CatalogEntry]) -> PathBuf {
    let path = dir.join("catalog.csv");
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer.write_record(["ra", "dec", "source_id"]).unwrap();
    for entry in entries {
        writer
            .write_record([
                format!("{:.12}", entry.ra),
                format!("{:.12}", entry.dec),
                entry.source_id.clone(),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
    path
}

/// Write a fetch script with one line per command and return its path.
pub fn write_script(dir: &Path, lines: &[&str]) -> PathBuf {
    let path = dir.join("fetch.sh");
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

/// Fetcher serving image files from a command → file name table.
///
/// Unknown commands fetch nothing. Every destination seen is recorded so
/// tests can check scratch cleanup.
#[derive(Default)]
pub struct MemoryFetcher {
    images: HashMap<String, String>,
    delay: Option<Duration>,
    seen: Mutex<Vec<PathBuf>>,
}

impl MemoryFetcher {
    pub fn new<I, C, N>(images: I) -> Self
    where
        I: IntoIterator<Item = (C, N)>,
        C: Into<String>,
        N: Into<String>,
    {
        MemoryFetcher {
            images: images
                .into_iter()
                .map(|(c, n)| (c.into(), n.into()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().clone()
    }
}

impl ImageFetcher for MemoryFetcher {
    fn fetch<'a>(&'a self, command: &'a str, dest: &'a Path) -> FetchFuture<'a> {
        Box::pin(async move {
            self.seen.lock().push(dest.to_path_buf());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(name) = self.images.get(command) {
                tokio::fs::write(dest.join(name), b"SIMPLE  =                    T").await?;
            }
            Ok(())
        })
    }
}

/// Loader decoding image files by name from an in-memory table.
///
/// Unknown names are unusable images; names starting with `panic` make the
/// loader panic. An optional delay blocks the calling thread before decoding.
#[derive(Default)]
pub struct MemoryLoader {
    frames: HashMap<String, Frame>,
    delay: Option<Duration>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(mut self, name: impl Into<String>, frame: Frame) -> Self {
        self.frames.insert(name.into(), frame);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl FrameLoader for MemoryLoader {
    fn load(&self, path: &Path) -> Result<Frame, FfiphotError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if name.starts_with("panic") {
            panic!("decoder crashed on {name}");
        }
        self.frames
            .get(&name)
            .cloned()
            .ok_or_else(|| FfiphotError::Image(format!("cannot decode {name}")))
    }
}

/// Number of entries left in `dir`.
pub fn dir_len(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, |entries| entries.count())
}
