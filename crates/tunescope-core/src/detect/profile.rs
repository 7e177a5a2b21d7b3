//! Per-domain detector configuration

use crate::calibration::CalibrationStore;
use crate::log::{Channel, LogDataset, LogRow};

use super::types::{Classification, Domain, Reading, Sample, Severity, Thresholds, Timing};

/// Everything that differs between the monitored domains
///
/// The detection pipeline is shared; a profile only says which channels it
/// reads, which rows are in regime, how a row becomes a [`Reading`] and how
/// readings are classified and scored.
pub trait DetectionProfile {
    /// Domain this profile monitors
    fn domain(&self) -> Domain;

    /// Event type names for `TypeA` and `TypeB`
    fn labels(&self) -> (&'static str, &'static str);

    /// Channels without which the detector cannot run
    fn required_channels(&self) -> Vec<Channel>;

    /// Channels reported alongside each sample when present
    fn context_channels(&self) -> Vec<Channel> {
        vec![Channel::Rpm, Channel::Load, Channel::Throttle]
    }

    /// Required channels the dataset did not bind
    fn missing_channels(&self, dataset: &LogDataset) -> Vec<Channel> {
        self.required_channels()
            .into_iter()
            .filter(|c| !dataset.has(*c))
            .collect()
    }

    /// Apply the regime filter and extract the metric, `None` to skip the row
    fn reading(&self, row: &LogRow, calibration: &CalibrationStore) -> Option<Reading>;

    /// Classification rule, possibly read from the calibration
    fn thresholds(&self, calibration: &CalibrationStore) -> Thresholds;

    /// Classify a reading; returns the class and the significance flag
    fn classify(&self, reading: &Reading, _row: &LogRow, thresholds: &Thresholds) -> (Classification, bool) {
        thresholds.classify(reading.value, reading.deviation)
    }

    /// Run, duration and grouping windows
    fn timing(&self) -> Timing;

    /// Ranks samples; the highest score represents an event or group
    fn severity_score(&self, sample: &Sample) -> f64 {
        sample.deviation.abs()
    }

    /// Severity of a representative sample
    fn severity(&self, sample: &Sample, thresholds: &Thresholds) -> Severity;

    /// Event type name for a classification
    fn label(&self, classification: Classification) -> &'static str {
        let (a, b) = self.labels();
        match classification {
            Classification::TypeA => a,
            Classification::TypeB => b,
            Classification::Normal => "normal",
        }
    }
}

/// Severity from descending magnitude breakpoints `[critical, high, medium]`
pub(crate) fn graded(magnitude: f64, breakpoints: [f64; 3]) -> Severity {
    let [critical, high, medium] = breakpoints;
    if magnitude >= critical {
        Severity::Critical
    } else if magnitude >= high {
        Severity::High
    } else if magnitude >= medium {
        Severity::Medium
    } else {
        Severity::Low
    }
}
