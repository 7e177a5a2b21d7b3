//! Analysis session
//!
//! Binds one calibration, one dataset and one configuration, builds every
//! detector plus the autotune engine over them and collects the results in a
//! serializable report. Engines share nothing mutable; each reads the same
//! borrowed inputs.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::autotune::{AutotuneEngine, AutotuneError, AutotuneReport};
use crate::calibration::{CalibrationMetadata, CalibrationStore};
use crate::config::AnalysisConfig;
use crate::detect::{DetectionResult, EventDetector};
use crate::log::{Channel, LogDataset};

/// Log facts included in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    /// Rows kept
    pub rows: usize,
    /// Rows dropped for an unusable time
    pub dropped_rows: usize,
    /// Column headers
    pub columns: Vec<String>,
    /// Column bound to each channel
    pub bindings: BTreeMap<Channel, String>,
    /// First and last row time
    pub time_range: Option<(f64, f64)>,
    /// Estimated seconds per row
    pub sampling_interval: f64,
}

impl LogSummary {
    /// Summarize a dataset
    pub fn of(dataset: &LogDataset) -> Self {
        Self {
            rows: dataset.len(),
            dropped_rows: dataset.dropped_rows(),
            columns: dataset.columns().to_vec(),
            bindings: dataset.bindings().clone(),
            time_range: dataset.time_range(),
            sampling_interval: dataset.sampling_interval(),
        }
    }
}

/// Everything one session produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// RFC 3339 UTC timestamp
    pub generated_at: String,
    /// Log facts
    pub log: LogSummary,
    /// Calibration identification, when loaded
    pub calibration: Option<CalibrationMetadata>,
    /// One result per detector, in domain order
    pub detections: Vec<DetectionResult>,
    /// Autotune report, when requested and possible
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autotune: Option<AutotuneReport>,
    /// Why autotune could not run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autotune_error: Option<String>,
}

/// One analysis run over a dataset and calibration
pub struct AnalysisSession<'a> {
    calibration: &'a CalibrationStore,
    dataset: &'a LogDataset,
    config: &'a AnalysisConfig,
}

impl<'a> AnalysisSession<'a> {
    /// Session over borrowed inputs
    pub fn new(
        calibration: &'a CalibrationStore,
        dataset: &'a LogDataset,
        config: &'a AnalysisConfig,
    ) -> Self {
        Self {
            calibration,
            dataset,
            config,
        }
    }

    /// One detector per configured profile
    pub fn detectors(&self) -> Vec<EventDetector<'a>> {
        self.config
            .profiles()
            .into_iter()
            .map(|profile| EventDetector::boxed(profile, self.dataset, self.calibration))
            .collect()
    }

    /// Run every detector
    pub fn run_detectors(&self) -> Vec<DetectionResult> {
        self.detectors()
            .into_iter()
            .map(EventDetector::into_result)
            .collect()
    }

    /// Autotune engine over the session inputs
    pub fn autotune_engine(&self) -> AutotuneEngine<'a> {
        AutotuneEngine::new(self.calibration, self.dataset)
    }

    /// Run autotune with the configured options
    pub fn autotune(&self) -> Result<AutotuneReport, AutotuneError> {
        self.autotune_engine().analyze(&self.config.autotune)
    }

    /// Run the detectors and, when asked, autotune
    ///
    /// An autotune precondition failure is recorded in the report rather
    /// than returned.
    pub fn run(&self, with_autotune: bool) -> SessionReport {
        let detections = self.run_detectors();
        let (autotune, autotune_error) = if with_autotune {
            match self.autotune() {
                Ok(report) => (Some(report), None),
                Err(e) => {
                    tracing::warn!("Autotune skipped: {e}");
                    (None, Some(e.to_string()))
                }
            }
        } else {
            (None, None)
        };

        SessionReport {
            generated_at: Utc::now().to_rfc3339(),
            log: LogSummary::of(self.dataset),
            calibration: self.calibration.metadata(),
            detections,
            autotune,
            autotune_error,
        }
    }
}
