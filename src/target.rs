//! # Target object and its light curve
//!
//! A [`Target`] carries the identity of the single celestial object whose
//! brightness is extracted from every frame: a name, a sky position, and
//! optionally an external catalog identifier and the observing window it
//! was scheduled in. Identity is fixed at construction. The photometry
//! series ([`LightCurve`]) is attached later, once the series assembler
//! has read the per-frame records.
//!
//! A target is built by whatever resolves names to positions (a catalog
//! query, a command line flag, ...) and is only ever borrowed (or shared
//! through an `Arc`) by the pipeline stages.
use std::path::Path;

use itertools::Itertools;
use serde::Serialize;

use crate::{
    constants::{Degree, JulianDate},
    conversion::{parse_dec_to_deg, parse_ra_to_deg},
    ffiphot_errors::FfiphotError,
};

/// Time-tagged flux measurements of one target.
///
/// `times` and `fluxes` are parallel sequences and always have the same length.
/// No ordering is implied; call [`LightCurve::sort_by_time`] when time order matters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightCurve {
    times: Vec<JulianDate>,
    fluxes: Vec<f64>,
}

#[derive(Serialize)]
struct LightCurveRow {
    time_jd: JulianDate,
    flux: f64,
}

impl LightCurve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a light curve from two parallel sequences.
    ///
    /// Return
    /// ----------
    /// * `None` if the two sequences do not have the same length.
    pub fn from_parts(times: Vec<JulianDate>, fluxes: Vec<f64>) -> Option<Self> {
        (times.len() == fluxes.len()).then_some(LightCurve { times, fluxes })
    }

    pub fn push(&mut self, time: JulianDate, flux: f64) {
        self.times.push(time);
        self.fluxes.push(flux);
    }

    pub fn times(&self) -> &[JulianDate] {
        &self.times
    }

    pub fn fluxes(&self) -> &[f64] {
        &self.fluxes
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Reorder both sequences by increasing time (stable for equal times).
    pub fn sort_by_time(&mut self) {
        let order: Vec<usize> = (0..self.times.len())
            .sorted_by(|&a, &b| self.times[a].total_cmp(&self.times[b]))
            .collect();
        self.times = order.iter().map(|&i| self.times[i]).collect();
        self.fluxes = order.iter().map(|&i| self.fluxes[i]).collect();
    }

    /// Write the series as a two-column CSV (`time_jd,flux`).
    pub fn write_csv(&self, path: &Path) -> Result<(), FfiphotError> {
        let mut writer = csv::Writer::from_path(path)?;
        for (&time_jd, &flux) in self.times.iter().zip(&self.fluxes) {
            writer.serialize(LightCurveRow { time_jd, flux })?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// The object whose photometry is extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    name: String,
    ra: Degree,
    dec: Degree,
    catalog_id: Option<String>,
    window: Option<i32>,
    series: Option<LightCurve>,
}

impl Target {
    /// Create a target from its name and ICRS position in degrees.
    pub fn new(name: impl Into<String>, ra: Degree, dec: Degree) -> Self {
        Target {
            name: name.into(),
            ra,
            dec,
            catalog_id: None,
            window: None,
            series: None,
        }
    }

    /// Create a target from sexagesimal strings (`HH MM SS.ss`, `±DD MM SS.s`).
    ///
    /// Return
    /// ----------
    /// * `None` if either coordinate cannot be parsed.
    pub fn from_sexagesimal(name: impl Into<String>, ra: &str, dec: &str) -> Option<Self> {
        Some(Target::new(name, parse_ra_to_deg(ra)?, parse_dec_to_deg(dec)?))
    }

    /// Attach the external catalog identifier of the target.
    pub fn with_catalog_id(mut self, id: impl Into<String>) -> Self {
        self.catalog_id = Some(id.into());
        self
    }

    /// Attach the observing window (sector) the target was resolved to.
    pub fn with_window(mut self, window: i32) -> Self {
        self.window = Some(window);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ra(&self) -> Degree {
        self.ra
    }

    pub fn dec(&self) -> Degree {
        self.dec
    }

    pub fn catalog_id(&self) -> Option<&str> {
        self.catalog_id.as_deref()
    }

    pub fn window(&self) -> Option<i32> {
        self.window
    }

    pub fn series(&self) -> Option<&LightCurve> {
        self.series.as_ref()
    }

    /// Store the extracted photometry series on the target.
    pub fn set_series(&mut self, series: LightCurve) {
        self.series = Some(series);
    }

    pub fn has_photometry(&self) -> bool {
        self.series.is_some()
    }
}
