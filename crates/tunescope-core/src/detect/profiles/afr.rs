//! Open-loop air/fuel ratio

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationStore;
use crate::detect::profile::{graded, DetectionProfile};
use crate::detect::types::{Classification, Domain, Reading, Sample, Severity, Thresholds, Timing};
use crate::log::{Channel, LogRow};

/// Measured vs target lambda while the ECU runs open loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AfrProfile {
    /// Measured minus target lambda above which a sample is lean
    pub lean_threshold: f64,
    /// Target minus measured lambda above which a sample is rich
    pub rich_threshold: f64,
    /// Deviation beyond this counts toward out-of-target time
    pub tolerance: f64,
    /// Rows with a target at or above this are closed loop and skipped
    pub open_loop_below: f64,
    /// Grouping windows
    pub timing: Timing,
}

impl Default for AfrProfile {
    fn default() -> Self {
        Self {
            lean_threshold: 0.03,
            rich_threshold: 0.05,
            tolerance: 0.02,
            open_loop_below: 0.85,
            timing: Timing::new(0.25, 0.10, 1.0, true),
        }
    }
}

impl DetectionProfile for AfrProfile {
    fn domain(&self) -> Domain {
        Domain::Afr
    }

    fn labels(&self) -> (&'static str, &'static str) {
        ("lean", "rich")
    }

    fn required_channels(&self) -> Vec<Channel> {
        vec![Channel::LambdaTarget, Channel::LambdaMeasured]
    }

    fn reading(&self, row: &LogRow, _calibration: &CalibrationStore) -> Option<Reading> {
        let target = row.lambda_target?;
        let measured = row.lambda_measured?;
        if target <= 0.0 || target >= self.open_loop_below || measured <= 0.0 {
            return None;
        }
        Some(Reading::against(measured, target))
    }

    fn thresholds(&self, _calibration: &CalibrationStore) -> Thresholds {
        Thresholds::Deviation {
            upper: self.lean_threshold,
            lower: self.rich_threshold,
            tolerance: self.tolerance,
        }
    }

    fn timing(&self) -> Timing {
        self.timing
    }

    fn severity(&self, sample: &Sample, _thresholds: &Thresholds) -> Severity {
        let magnitude = sample.deviation.abs();
        match sample.classification {
            Classification::TypeA => graded(magnitude, [0.08, 0.05, 0.03]),
            // Rich never rates critical
            Classification::TypeB => graded(magnitude, [f64::INFINITY, 0.10, 0.05]),
            Classification::Normal => Severity::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regime() {
        let profile = AfrProfile::default();
        let cal = CalibrationStore::new();
        let row = |target, measured| {
            LogRow::at(0.0)
                .with(Channel::LambdaTarget, target)
                .with(Channel::LambdaMeasured, measured)
        };
        assert!(profile.reading(&row(0.80, 0.84), &cal).is_some());
        assert!(profile.reading(&row(1.00, 1.02), &cal).is_none());
        assert!(profile.reading(&row(0.80, 0.0), &cal).is_none());
        assert!(profile.reading(&row(0.0, 0.9), &cal).is_none());
    }

    #[test]
    fn test_severity() {
        let profile = AfrProfile::default();
        let rule = profile.thresholds(&CalibrationStore::new());
        let sample = |deviation, classification| Sample {
            deviation,
            classification,
            ..Sample::default()
        };
        assert_eq!(profile.severity(&sample(0.09, Classification::TypeA), &rule), Severity::Critical);
        assert_eq!(profile.severity(&sample(0.04, Classification::TypeA), &rule), Severity::Medium);
        assert_eq!(profile.severity(&sample(-0.12, Classification::TypeB), &rule), Severity::High);
        assert_eq!(profile.severity(&sample(-0.06, Classification::TypeB), &rule), Severity::Medium);
    }
}
