//! # Positional catalog
//!
//! The catalog lists every source that may appear around the target: one
//! `(ra, dec, source_id)` row per source, produced by an external astrometric
//! query and stored as CSV. Positions are ICRS degrees; identifiers are kept
//! as text so 64-bit survey identifiers survive untouched.
//!
//! Loading is deterministic for a given file content. Repeated loads should
//! go through [`cache::CatalogCache`], which memoizes the parsed rows.
//!
//! ## File format
//!
//! ```text
//! ra,dec,source_id
//! 60.1700,12.4903,3302846072717868416
//! 60.1812,12.5011,3302846076012345600
//! ```
//!
//! Extra columns are ignored and column order is free; a missing `ra`,
//! `dec` or `source_id` column is a [`FfiphotError::CatalogLoad`].
pub mod cache;

use std::path::Path;

use serde::Deserialize;

use crate::{constants::Degree, ffiphot_errors::FfiphotError};

const REQUIRED_COLUMNS: [&str; 3] = ["ra", "dec", "source_id"];

/// One catalog source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogEntry {
    pub ra: Degree,
    pub dec: Degree,
    pub source_id: String,
}

impl CatalogEntry {
    pub fn new(ra: Degree, dec: Degree, source_id: impl Into<String>) -> Self {
        CatalogEntry {
            ra,
            dec,
            source_id: source_id.into(),
        }
    }
}

/// Read a catalog CSV file.
///
/// Arguments
/// -----------------
/// * `path`: Path to a CSV file with at least the `ra`, `dec` and `source_id` columns.
///
/// Return
/// ----------
/// * The catalog rows in file order, or [`FfiphotError::CatalogLoad`] if the file does not
///   exist, lacks a required column, or holds a malformed row.
pub fn load_catalog_file(path: &Path) -> Result<Vec<CatalogEntry>, FfiphotError> {
    if !path.is_file() {
        return Err(FfiphotError::catalog_load(path, "file does not exist"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| FfiphotError::catalog_load(path, e))?;

    let headers = reader
        .headers()
        .map_err(|e| FfiphotError::catalog_load(path, e))?
        .clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(FfiphotError::catalog_load(
            path,
            format!("missing column(s): {}", missing.join(", ")),
        ));
    }

    reader
        .deserialize::<CatalogEntry>()
        .enumerate()
        .map(|(row, entry)| {
            entry.map_err(|e| FfiphotError::catalog_load(path, format!("row {}: {e}", row + 1)))
        })
        .collect()
}

#[cfg(test)]
mod catalog_test {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_catalog_keeps_ids_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.csv");
        fs::write(
            &path,
            "source_id,ra,dec,phot_g_mean_mag\n\
             3302846072717868416,60.17,12.49,3.4\n\
             0000000000000000042,60.20,12.50,11.2\n",
        )
        .unwrap();

        let catalog = load_catalog_file(&path).unwrap();
        assert_eq!(
            catalog,
            vec![
                CatalogEntry::new(60.17, 12.49, "3302846072717868416"),
                CatalogEntry::new(60.20, 12.50, "0000000000000000042"),
            ]
        );
    }

    #[test]
    fn test_missing_file() {
        let err = load_catalog_file(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, FfiphotError::CatalogLoad { .. }));
    }

    #[test]
    fn test_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.csv");
        fs::write(&path, "ra,dec\n1.0,2.0\n").unwrap();

        let err = load_catalog_file(&path).unwrap_err();
        assert_eq!(
            err,
            FfiphotError::CatalogLoad {
                path: path.display().to_string(),
                reason: "missing column(s): source_id".into(),
            }
        );
    }

    #[test]
    fn test_malformed_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.csv");
        fs::write(&path, "ra,dec,source_id\nabc,2.0,7\n").unwrap();

        assert!(matches!(
            load_catalog_file(&path),
            Err(FfiphotError::CatalogLoad { .. })
        ));
    }
}
