//! Error types for calibration loading

use thiserror::Error;

/// Errors that can occur while loading a calibration document
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// Reading the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The text is not JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON without a usable `maps` array
    #[error("Invalid calibration document: {0}")]
    InvalidDocument(String),
}
