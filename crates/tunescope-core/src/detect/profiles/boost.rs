//! Boost control

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationStore;
use crate::detect::profile::{graded, DetectionProfile};
use crate::detect::types::{Classification, Domain, Reading, Sample, Severity, Thresholds, Timing};
use crate::log::{Channel, LogRow};

/// Manifold pressure vs boost target (kPa absolute)
///
/// Uses the logged target when present, otherwise the calibration's boost
/// target table at the row's rpm and throttle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostProfile {
    /// kPa over target that counts as overboost
    pub overboost_threshold: f64,
    /// kPa under target that counts as underboost
    pub underboost_threshold: f64,
    /// Deviation beyond this counts toward out-of-target time
    pub tolerance: f64,
    /// Rows below this pressure are off boost and skipped
    pub min_pressure: f64,
    /// Overshoot below this throttle is ignored
    pub min_overboost_throttle: f64,
    /// Grouping windows
    pub timing: Timing,
}

impl Default for BoostProfile {
    fn default() -> Self {
        Self {
            overboost_threshold: 10.0,
            underboost_threshold: 15.0,
            tolerance: 5.0,
            min_pressure: 100.0,
            min_overboost_throttle: 30.0,
            timing: Timing::new(0.5, 0.25, 2.0, true),
        }
    }
}

impl DetectionProfile for BoostProfile {
    fn domain(&self) -> Domain {
        Domain::Boost
    }

    fn labels(&self) -> (&'static str, &'static str) {
        ("overboost", "underboost")
    }

    fn required_channels(&self) -> Vec<Channel> {
        vec![Channel::Boost]
    }

    fn context_channels(&self) -> Vec<Channel> {
        vec![
            Channel::Rpm,
            Channel::Load,
            Channel::Throttle,
            Channel::BoostTarget,
            Channel::WastegateDuty,
        ]
    }

    fn reading(&self, row: &LogRow, calibration: &CalibrationStore) -> Option<Reading> {
        let actual = row.boost?;
        if actual < self.min_pressure {
            return None;
        }
        let rpm = row.rpm.unwrap_or(0.0);
        let target = row
            .boost_target
            .unwrap_or_else(|| calibration.boost_target(rpm, row.throttle.unwrap_or(100.0)));
        Some(Reading {
            limit: Some(calibration.boost_limit(rpm)),
            aux: row.wastegate_duty,
            ..Reading::against(actual, target)
        })
    }

    fn thresholds(&self, _calibration: &CalibrationStore) -> Thresholds {
        Thresholds::Deviation {
            upper: self.overboost_threshold,
            lower: self.underboost_threshold,
            tolerance: self.tolerance,
        }
    }

    fn classify(&self, reading: &Reading, row: &LogRow, thresholds: &Thresholds) -> (Classification, bool) {
        let (mut class, mut significant) = thresholds.classify(reading.value, reading.deviation);
        if reading.limit.is_some_and(|limit| reading.value > limit) {
            class = Classification::TypeA;
            significant = true;
        }

        let part_throttle = row
            .throttle
            .is_some_and(|tps| tps < self.min_overboost_throttle);
        if part_throttle && reading.deviation > 0.0 {
            return (Classification::Normal, false);
        }
        (class, significant)
    }

    fn timing(&self) -> Timing {
        self.timing
    }

    fn severity(&self, sample: &Sample, _thresholds: &Thresholds) -> Severity {
        graded(sample.deviation.abs(), [30.0, 20.0, 10.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(row: &LogRow) -> (Classification, bool) {
        let profile = BoostProfile::default();
        let cal = CalibrationStore::new();
        let reading = profile.reading(row, &cal).unwrap();
        profile.classify(&reading, row, &profile.thresholds(&cal))
    }

    #[test]
    fn test_logged_target() {
        let row = LogRow::at(0.0)
            .with(Channel::Boost, 215.0)
            .with(Channel::BoostTarget, 200.0)
            .with(Channel::Throttle, 90.0);
        assert_eq!(classify(&row), (Classification::TypeA, true));
    }

    #[test]
    fn test_calibration_fallback_target() {
        // No target column and no calibration: target is 180 kPa
        let row = LogRow::at(0.0).with(Channel::Boost, 160.0).with(Channel::Throttle, 90.0);
        assert_eq!(classify(&row), (Classification::TypeB, true));
    }

    #[test]
    fn test_limit_forces_overboost() {
        let row = LogRow::at(0.0)
            .with(Channel::Boost, 255.0)
            .with(Channel::BoostTarget, 250.0)
            .with(Channel::Throttle, 90.0);
        assert_eq!(classify(&row), (Classification::TypeA, true));
    }

    #[test]
    fn test_part_throttle_overshoot_ignored() {
        let row = LogRow::at(0.0)
            .with(Channel::Boost, 220.0)
            .with(Channel::BoostTarget, 180.0)
            .with(Channel::Throttle, 20.0);
        assert_eq!(classify(&row), (Classification::Normal, false));
    }

    #[test]
    fn test_off_boost_skipped() {
        let profile = BoostProfile::default();
        let row = LogRow::at(0.0).with(Channel::Boost, 90.0);
        assert!(profile.reading(&row, &CalibrationStore::new()).is_none());
    }
}
