//! Autotune errors

use thiserror::Error;

/// Reasons an autotune analysis or export cannot proceed
///
/// None of these abort the process; the analysis simply produces no report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutotuneError {
    /// Nothing has been parsed into the store
    #[error("No calibration loaded")]
    CalibrationNotLoaded,

    /// The dataset is empty
    #[error("Log has no rows")]
    NoLogRows,

    /// A required channel is not bound to any column
    #[error("Missing {role} column (tried: {})", candidates.join(", "))]
    MissingColumn {
        /// Channel label
        role: String,
        /// Column names that were tried
        candidates: Vec<String>,
    },

    /// Axis map absent or empty
    #[error("Calibration axis '{0}' is missing or empty")]
    MissingAxis(String),

    /// Axis present but not usable for lookups
    #[error("Calibration axis '{0}' is not strictly ascending")]
    InvalidAxis(String),

    /// Fuel table absent
    #[error("Calibration table '{0}' is missing")]
    MissingTable(String),

    /// Table shape disagrees with its axes
    #[error("Table '{table}' is {found:?} but its axes require {expected:?}")]
    TableShapeMismatch {
        /// Table map id
        table: String,
        /// `(rpm axis, load axis)` lengths
        expected: (usize, usize),
        /// Shape of the stored table
        found: (usize, usize),
    },

    /// PE enable array length differs from the RPM axis
    #[error("PE enable map '{map}' has {found} entries but the RPM axis has {expected}")]
    PeEnableMismatch {
        /// Map id
        map: String,
        /// RPM axis length
        expected: usize,
        /// Array length
        found: usize,
    },

    /// The export base document does not parse as a calibration
    #[error("Invalid base document: {0}")]
    InvalidBaseDocument(String),

    /// Export base table or axis differs in shape from the analysis
    #[error("Dimension mismatch for '{map}': analysis {analysis:?}, base {base:?}")]
    DimensionMismatch {
        /// Map whose shape differs
        map: String,
        /// Shape in the analysed calibration
        analysis: (usize, usize),
        /// Shape in the base document
        base: (usize, usize),
    },
}
