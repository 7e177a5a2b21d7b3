//! # TuneScope Core Library
//!
//! Post-drive analysis of ECU datalogs against an engine calibration.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Column binding and unit normalization for logged channels
//! - Calibration document parsing with tolerant coercion and clamped
//!   linear/bilinear lookups
//! - Event detection for air/fuel ratio, boost, fuel trims, coolant and
//!   intake air temperature, and knock
//! - Autotune: bounded fuel table corrections and export into a calibration
//!
//! ## Example
//!
//! ```rust,ignore
//! use tunescope_core::prelude::*;
//!
//! let mut calibration = CalibrationStore::new();
//! calibration.load("tune.json")?;
//!
//! let dataset = LogDataset::from_raw(raw_log, &IngestOptions::default());
//! let config = AnalysisConfig::default();
//!
//! let session = AnalysisSession::new(&calibration, &dataset, &config);
//! let report = session.run(true);
//! for detection in &report.detections {
//!     println!("{}: {} groups", detection.domain.name(), detection.event_groups.len());
//! }
//! ```

pub mod autotune;
pub mod calibration;
pub mod config;
pub mod demo;
pub mod detect;
pub mod log;
pub mod session;
pub mod units;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::autotune::{
        AutotuneEngine, AutotuneError, AutotuneFilters, AutotuneOptions, AutotuneReport,
        CorrectionCell, FuelMode,
    };
    pub use crate::calibration::{CalibrationError, CalibrationStore, MapIds, MapKind};
    pub use crate::config::{AnalysisConfig, ConfigError};
    pub use crate::detect::{
        Classification, DetectionProfile, DetectionResult, Domain, Event, EventDetector,
        EventGroup, Severity, Statistics,
    };
    pub use crate::log::{Channel, IngestOptions, LogDataset, LogRow, RawLog};
    pub use crate::session::{AnalysisSession, SessionReport};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
