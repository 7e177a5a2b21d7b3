//! Intake air temperature

use serde::{Deserialize, Serialize};

use super::coolant::rising_severity;
use crate::calibration::CalibrationStore;
use crate::detect::profile::DetectionProfile;
use crate::detect::types::{Domain, Reading, Sample, Severity, Thresholds, Timing};
use crate::log::{Channel, LogRow};

/// Intake air temperature against the calibration's IAT breakpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeAirProfile {
    /// Grouping windows
    pub timing: Timing,
}

impl Default for IntakeAirProfile {
    fn default() -> Self {
        Self {
            timing: Timing::new(2.0, 0.5, 10.0, false),
        }
    }
}

impl DetectionProfile for IntakeAirProfile {
    fn domain(&self) -> Domain {
        Domain::IntakeAirTemp
    }

    fn labels(&self) -> (&'static str, &'static str) {
        ("warm", "hot")
    }

    fn required_channels(&self) -> Vec<Channel> {
        vec![Channel::IntakeAirTemp]
    }

    fn reading(&self, row: &LogRow, _calibration: &CalibrationStore) -> Option<Reading> {
        row.intake_air_temp.map(Reading::value)
    }

    fn thresholds(&self, calibration: &CalibrationStore) -> Thresholds {
        let iat = calibration.iat_thresholds();
        Thresholds::Rising {
            warning: iat.warning,
            critical: iat.critical,
        }
    }

    fn timing(&self) -> Timing {
        self.timing
    }

    fn severity_score(&self, sample: &Sample) -> f64 {
        sample.value
    }

    fn severity(&self, sample: &Sample, thresholds: &Thresholds) -> Severity {
        rising_severity(sample.value, thresholds)
    }
}
