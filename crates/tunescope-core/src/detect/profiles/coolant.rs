//! Coolant temperature

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationStore;
use crate::detect::profile::DetectionProfile;
use crate::detect::types::{Domain, Reading, Sample, Severity, Thresholds, Timing};
use crate::log::{Channel, LogRow};

/// Coolant temperature against the calibration's fan switch points
///
/// Warning is the high-speed fan threshold; critical sits `overheat_margin`
/// above it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoolantProfile {
    /// Degrees above the high fan threshold that count as overheating
    pub overheat_margin: f64,
    /// Grouping windows
    pub timing: Timing,
}

impl Default for CoolantProfile {
    fn default() -> Self {
        Self {
            overheat_margin: 10.0,
            timing: Timing::new(2.0, 0.5, 10.0, false),
        }
    }
}

impl DetectionProfile for CoolantProfile {
    fn domain(&self) -> Domain {
        Domain::CoolantTemp
    }

    fn labels(&self) -> (&'static str, &'static str) {
        ("hot", "overheat")
    }

    fn required_channels(&self) -> Vec<Channel> {
        vec![Channel::CoolantTemp]
    }

    fn reading(&self, row: &LogRow, _calibration: &CalibrationStore) -> Option<Reading> {
        row.coolant_temp.map(Reading::value)
    }

    fn thresholds(&self, calibration: &CalibrationStore) -> Thresholds {
        let fans = calibration.fan_thresholds();
        Thresholds::Rising {
            warning: fans.high_on,
            critical: fans.high_on + self.overheat_margin,
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

/// Severity from warning/critical breakpoints; high starts halfway between
pub(crate) fn rising_severity(value: f64, thresholds: &Thresholds) -> Severity {
    let Thresholds::Rising { warning, critical } = *thresholds else {
        return Severity::Low;
    };
    if value >= critical {
        Severity::Critical
    } else if value >= (warning + critical) / 2.0 {
        Severity::High
    } else if value >= warning {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_thresholds_follow_calibration() {
        let profile = CoolantProfile::default();
        let mut cal = CalibrationStore::new();
        assert_eq!(
            profile.thresholds(&cal),
            Thresholds::Rising {
                warning: 102.0,
                critical: 112.0
            }
        );

        assert!(cal.parse_value(json!({"maps": [
            {"id": "fan_low_on", "value": 92},
            {"id": "fan_high_on", "value": 98}
        ]})));
        assert_eq!(
            profile.thresholds(&cal),
            Thresholds::Rising {
                warning: 98.0,
                critical: 108.0
            }
        );
    }

    #[test]
    fn test_severity() {
        let rule = Thresholds::Rising {
            warning: 100.0,
            critical: 110.0,
        };
        assert_eq!(rising_severity(99.0, &rule), Severity::Low);
        assert_eq!(rising_severity(101.0, &rule), Severity::Medium);
        assert_eq!(rising_severity(106.0, &rule), Severity::High);
        assert_eq!(rising_severity(110.0, &rule), Severity::Critical);
    }
}
