//! Closed-loop fuel trims

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationStore;
use crate::detect::profile::{graded, DetectionProfile};
use crate::detect::types::{Domain, Reading, Sample, Severity, Thresholds, Timing};
use crate::log::{Channel, LogRow};

/// Which trim a [`FuelTrimProfile`] watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimKind {
    /// STFT
    ShortTerm,
    /// LTFT
    LongTerm,
}

impl TrimKind {
    /// Logged channel for this trim
    pub fn channel(&self) -> Channel {
        match self {
            TrimKind::ShortTerm => Channel::ShortTermTrim,
            TrimKind::LongTerm => Channel::LongTermTrim,
        }
    }
}

/// Fuel trim percentage while the ECU runs closed loop
///
/// When rpm is logged, rows at or below `min_rpm` are skipped; when a lambda
/// target is logged, rows targeting richer than `closed_loop_target` are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelTrimProfile {
    /// Trim being watched
    pub kind: TrimKind,
    /// Trim above which the ECU is adding fuel
    pub adding_threshold: f64,
    /// Trim below the negative of which the ECU is pulling fuel
    pub pulling_threshold: f64,
    /// Trim beyond this counts toward out-of-target time
    pub tolerance: f64,
    /// Rows at or below this rpm are skipped
    pub min_rpm: f64,
    /// Lambda targets below this are open loop and skipped
    pub closed_loop_target: f64,
    /// Grouping windows
    pub timing: Timing,
}

impl FuelTrimProfile {
    /// Short-term trim defaults
    pub fn short_term() -> Self {
        Self::default()
    }

    /// Long-term trim defaults, with a wider grouping window
    pub fn long_term() -> Self {
        Self {
            kind: TrimKind::LongTerm,
            adding_threshold: 8.0,
            pulling_threshold: 8.0,
            timing: Timing::new(0.5, 0.5, 5.0, true),
            ..Self::default()
        }
    }
}

impl Default for FuelTrimProfile {
    fn default() -> Self {
        Self {
            kind: TrimKind::ShortTerm,
            adding_threshold: 10.0,
            pulling_threshold: 10.0,
            tolerance: 5.0,
            min_rpm: 400.0,
            closed_loop_target: 0.99,
            timing: Timing::new(0.5, 0.5, 2.0, true),
        }
    }
}

impl DetectionProfile for FuelTrimProfile {
    fn domain(&self) -> Domain {
        match self.kind {
            TrimKind::ShortTerm => Domain::ShortTermTrim,
            TrimKind::LongTerm => Domain::LongTermTrim,
        }
    }

    fn labels(&self) -> (&'static str, &'static str) {
        ("adding", "pulling")
    }

    fn required_channels(&self) -> Vec<Channel> {
        vec![self.kind.channel()]
    }

    fn context_channels(&self) -> Vec<Channel> {
        vec![Channel::Rpm, Channel::Load, Channel::Throttle, Channel::LambdaTarget]
    }

    fn reading(&self, row: &LogRow, _calibration: &CalibrationStore) -> Option<Reading> {
        let trim = row.get(self.kind.channel())?;
        if row.rpm.is_some_and(|rpm| rpm <= self.min_rpm) {
            return None;
        }
        if row
            .lambda_target
            .is_some_and(|target| target < self.closed_loop_target)
        {
            return None;
        }
        Some(Reading::value(trim))
    }

    fn thresholds(&self, _calibration: &CalibrationStore) -> Thresholds {
        Thresholds::Deviation {
            upper: self.adding_threshold,
            lower: self.pulling_threshold,
            tolerance: self.tolerance,
        }
    }

    fn timing(&self) -> Timing {
        self.timing
    }

    fn severity(&self, sample: &Sample, _thresholds: &Thresholds) -> Severity {
        graded(sample.value.abs(), [20.0, 15.0, 10.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::types::Classification;

    #[test]
    fn test_regime_uses_present_channels_only() {
        let profile = FuelTrimProfile::short_term();
        let cal = CalibrationStore::new();
        let bare = LogRow::at(0.0).with(Channel::ShortTermTrim, 12.0);
        assert!(profile.reading(&bare, &cal).is_some());

        let idle = bare.clone().with(Channel::Rpm, 300.0);
        assert!(profile.reading(&idle, &cal).is_none());

        let enriched = bare.with(Channel::Rpm, 3000.0).with(Channel::LambdaTarget, 0.85);
        assert!(profile.reading(&enriched, &cal).is_none());
    }

    #[test]
    fn test_long_term_thresholds() {
        let profile = FuelTrimProfile::long_term();
        let rule = profile.thresholds(&CalibrationStore::new());
        assert_eq!(profile.domain(), Domain::LongTermTrim);
        assert_eq!(rule.classify(9.0, 9.0), (Classification::TypeA, true));
        assert_eq!(rule.classify(-9.0, -9.0), (Classification::TypeB, true));
        assert_eq!(rule.classify(6.0, 6.0), (Classification::Normal, true));
    }
}
