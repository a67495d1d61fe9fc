use thiserror::Error;

#[derive(Error, Debug)]
pub enum FfiphotError {
    #[error("Unable to load catalog {path}: {reason}")]
    CatalogLoad { path: String, reason: String },

    #[error("No photometric data: {0}")]
    NoData(String),

    #[error("Fetch script is empty: {0}")]
    EmptyScript(String),

    #[error("Invalid photometry parameter: {0}")]
    InvalidPhotometryParameter(String),

    #[error("Invalid DATE-OBS value: {0}")]
    InvalidDateObs(String),

    #[error("Sky position cannot be projected: {0}")]
    Projection(String),

    #[error("Unusable image product: {0}")]
    Image(String),

    #[error("Invalid checkpoint: {0}")]
    Checkpoint(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[cfg(feature = "script-download")]
    #[error("HTTP reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[cfg(feature = "fits")]
    #[error("FITS error: {0}")]
    FitsError(#[from] fitsio::errors::Error),
}

impl PartialEq for FfiphotError {
    fn eq(&self, other: &Self) -> bool {
        use FfiphotError::*;
        match (self, other) {
            (
                CatalogLoad {
                    path: p1,
                    reason: r1,
                },
                CatalogLoad {
                    path: p2,
                    reason: r2,
                },
            ) => p1 == p2 && r1 == r2,
            (NoData(a), NoData(b)) => a == b,
            (EmptyScript(a), EmptyScript(b)) => a == b,
            (InvalidPhotometryParameter(a), InvalidPhotometryParameter(b)) => a == b,
            (InvalidDateObs(a), InvalidDateObs(b)) => a == b,
            (Projection(a), Projection(b)) => a == b,
            (Image(a), Image(b)) => a == b,
            (Checkpoint(a), Checkpoint(b)) => a == b,

            // foreign errors are not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,
            #[cfg(feature = "script-download")]
            (ReqwestError(_), ReqwestError(_)) => true,
            #[cfg(feature = "fits")]
            (FitsError(_), FitsError(_)) => true,

            _ => false,
        }
    }
}

impl FfiphotError {
    pub(crate) fn catalog_load(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        FfiphotError::CatalogLoad {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}
