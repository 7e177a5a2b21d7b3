//! Knock retard

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationStore;
use crate::detect::profile::{graded, DetectionProfile};
use crate::detect::types::{Domain, Reading, Sample, Severity, Thresholds, Timing};
use crate::log::{Channel, LogRow};

/// Knock retard in degrees (zero or negative)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnockProfile {
    /// Retard at or below which a sample counts as knock
    pub knock_threshold: f64,
    /// Retard at or below which a sample counts as heavy knock
    pub heavy_threshold: f64,
    /// Grouping windows
    pub timing: Timing,
}

impl Default for KnockProfile {
    fn default() -> Self {
        Self {
            knock_threshold: -1.0,
            heavy_threshold: -4.0,
            timing: Timing::new(0.25, 0.0, 1.0, false),
        }
    }
}

impl DetectionProfile for KnockProfile {
    fn domain(&self) -> Domain {
        Domain::Knock
    }

    fn labels(&self) -> (&'static str, &'static str) {
        ("knock", "heavy_knock")
    }

    fn required_channels(&self) -> Vec<Channel> {
        vec![Channel::KnockRetard]
    }

    fn context_channels(&self) -> Vec<Channel> {
        vec![Channel::Rpm, Channel::Load, Channel::Throttle, Channel::Iam]
    }

    fn reading(&self, row: &LogRow, _calibration: &CalibrationStore) -> Option<Reading> {
        let retard = row.knock_retard?;
        Some(Reading {
            aux: row.iam,
            ..Reading::value(retard)
        })
    }

    fn thresholds(&self, _calibration: &CalibrationStore) -> Thresholds {
        Thresholds::Falling {
            warning: self.knock_threshold,
            critical: self.heavy_threshold,
        }
    }

    fn timing(&self) -> Timing {
        self.timing
    }

    fn severity_score(&self, sample: &Sample) -> f64 {
        -sample.value
    }

    fn severity(&self, sample: &Sample, _thresholds: &Thresholds) -> Severity {
        graded(-sample.value, [6.0, 4.0, 2.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::types::Classification;

    #[test]
    fn test_classification_and_severity() {
        let profile = KnockProfile::default();
        let rule = profile.thresholds(&CalibrationStore::new());
        assert_eq!(rule.classify(-0.5, -0.5), (Classification::Normal, false));
        assert_eq!(rule.classify(-2.0, -2.0), (Classification::TypeA, true));
        assert_eq!(rule.classify(-4.0, -4.0), (Classification::TypeB, true));

        let sample = |value| Sample {
            value,
            ..Sample::default()
        };
        assert_eq!(profile.severity(&sample(-1.5), &rule), Severity::Low);
        assert_eq!(profile.severity(&sample(-2.5), &rule), Severity::Medium);
        assert_eq!(profile.severity(&sample(-4.0), &rule), Severity::High);
        assert_eq!(profile.severity(&sample(-7.0), &rule), Severity::Critical);
        assert!(profile.severity_score(&sample(-7.0)) > profile.severity_score(&sample(-2.0)));
    }
}
