//! Detection data types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::log::Channel;

/// Monitored quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Open-loop air/fuel ratio
    Afr,
    /// Manifold pressure against target
    Boost,
    /// Short-term fuel trim
    ShortTermTrim,
    /// Long-term fuel trim
    LongTermTrim,
    /// Coolant temperature
    CoolantTemp,
    /// Intake air temperature
    IntakeAirTemp,
    /// Knock retard
    Knock,
}

impl Domain {
    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Domain::Afr => "Air/Fuel Ratio",
            Domain::Boost => "Boost",
            Domain::ShortTermTrim => "Short Term Fuel Trim",
            Domain::LongTermTrim => "Long Term Fuel Trim",
            Domain::CoolantTemp => "Coolant Temperature",
            Domain::IntakeAirTemp => "Intake Air Temperature",
            Domain::Knock => "Knock",
        }
    }
}

/// Per-sample classification
///
/// What `TypeA` and `TypeB` mean depends on the domain (lean/rich,
/// overboost/underboost, ...); see [`DetectionProfile::labels`](super::DetectionProfile::labels).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Within thresholds
    #[default]
    Normal,
    /// First non-normal class (lean, overboost, adding, hot, ...)
    TypeA,
    /// Second non-normal class (rich, underboost, pulling, overheat, ...)
    TypeB,
}

impl Classification {
    /// True for [`Classification::Normal`]
    pub fn is_normal(&self) -> bool {
        *self == Classification::Normal
    }
}

/// How bad an event is, ordered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth a look
    #[default]
    Low,
    /// Should be tuned out
    Medium,
    /// Risky under sustained load
    High,
    /// Engine damage likely
    Critical,
}

/// Grouping windows, all in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Largest gap between consecutive members of one event
    pub run_gap: f64,
    /// Events shorter than this are dropped
    pub min_duration: f64,
    /// Events starting within this window of the previous member join its group
    pub coalesce_window: f64,
    /// Close an event when its members switch between non-normal classes
    pub split_on_change: bool,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            run_gap: 0.5,
            min_duration: 0.0,
            coalesce_window: 1.0,
            split_on_change: true,
        }
    }
}

impl Timing {
    /// Timing from explicit windows
    pub const fn new(run_gap: f64, min_duration: f64, coalesce_window: f64, split_on_change: bool) -> Self {
        Self {
            run_gap,
            min_duration,
            coalesce_window,
            split_on_change,
        }
    }
}

/// Classification rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Thresholds {
    /// Two-sided rule over the deviation from target
    Deviation {
        /// Deviation above this is `TypeA`
        upper: f64,
        /// Deviation below `-lower` is `TypeB`
        lower: f64,
        /// Deviation beyond this is significant even when normal
        tolerance: f64,
    },
    /// Value at or above a breakpoint (temperatures)
    Rising {
        /// `TypeA` from here
        warning: f64,
        /// `TypeB` from here
        critical: f64,
    },
    /// Value at or below a breakpoint (knock retard)
    Falling {
        /// `TypeA` from here down
        warning: f64,
        /// `TypeB` from here down
        critical: f64,
    },
}

impl Thresholds {
    /// Classify a value and its deviation from target
    ///
    /// Returns the classification and whether the sample is significant.
    pub fn classify(&self, value: f64, deviation: f64) -> (Classification, bool) {
        match *self {
            Thresholds::Deviation {
                upper,
                lower,
                tolerance,
            } => {
                let class = if deviation > upper {
                    Classification::TypeA
                } else if deviation < -lower {
                    Classification::TypeB
                } else {
                    Classification::Normal
                };
                (class, !class.is_normal() || deviation.abs() > tolerance)
            }
            Thresholds::Rising { warning, critical } => {
                let class = if value >= critical {
                    Classification::TypeB
                } else if value >= warning {
                    Classification::TypeA
                } else {
                    Classification::Normal
                };
                (class, !class.is_normal())
            }
            Thresholds::Falling { warning, critical } => {
                let class = if value <= critical {
                    Classification::TypeB
                } else if value <= warning {
                    Classification::TypeA
                } else {
                    Classification::Normal
                };
                (class, !class.is_normal())
            }
        }
    }
}

/// Metric extracted from one row by a profile
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    /// Measured value
    pub value: f64,
    /// Target the value is compared with
    pub target: Option<f64>,
    /// Value minus target, or the value itself
    pub deviation: f64,
    /// Hard ceiling for the value at this operating point
    pub limit: Option<f64>,
    /// Domain-specific extra channel (wastegate duty, IAM)
    pub aux: Option<f64>,
}

impl Reading {
    /// A reading with no target; the deviation is the value itself
    pub fn value(value: f64) -> Self {
        Self {
            value,
            deviation: value,
            ..Self::default()
        }
    }

    /// A reading measured against a target
    pub fn against(value: f64, target: f64) -> Self {
        Self {
            value,
            target: Some(target),
            deviation: value - target,
            ..Self::default()
        }
    }
}

/// A classified row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds from log start
    pub time: f64,
    /// Measured value
    pub value: f64,
    /// Target at this row
    pub target: Option<f64>,
    /// Classified quantity
    pub deviation: f64,
    /// Operating point
    pub rpm: Option<f64>,
    /// Engine load
    pub load: Option<f64>,
    /// Throttle (%)
    pub throttle: Option<f64>,
    /// Domain-specific extra channel
    pub aux: Option<f64>,
    /// Class from the thresholds
    pub classification: Classification,
    /// Non-normal or outside the tolerance
    pub significant: bool,
}

/// A contiguous run of significant samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Class of the run
    pub classification: Classification,
    /// Domain label of the class
    pub event_type: String,
    /// First member time
    pub start: f64,
    /// Last member time
    pub end: f64,
    /// Span plus one sampling interval, floored at members x interval
    pub duration: f64,
    /// Members
    pub sample_count: usize,
    /// Severity of the representative
    pub severity: Severity,
    /// Most severe member
    pub representative: Sample,
    /// Averages over the members
    pub mean_value: f64,
    /// Mean deviation of the members
    pub mean_deviation: f64,
    /// Largest absolute deviation
    pub max_abs_deviation: f64,
    /// Mean rpm, when logged
    pub mean_rpm: Option<f64>,
    /// Mean load, when logged
    pub mean_load: Option<f64>,
    /// Mean throttle, when logged
    pub mean_throttle: Option<f64>,
    /// Members, kept for statistics
    #[serde(skip)]
    pub samples: Vec<Sample>,
}

/// Nearby events of one classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGroup {
    /// Class shared by every member event
    pub classification: Classification,
    /// Domain label of the class
    pub event_type: String,
    /// First event start
    pub start: f64,
    /// Last event end
    pub end: f64,
    /// Sum of member durations
    pub duration: f64,
    /// Member events
    pub event_count: usize,
    /// Samples across member events
    pub sample_count: usize,
    /// Severity of the most severe member
    pub severity: Severity,
    /// Most severe sample across members
    pub representative: Sample,
    /// Deviation of the representative sample
    pub peak_deviation: f64,
    /// Value of the representative sample
    pub peak_value: f64,
    /// Largest member deviation
    pub max_abs_deviation: f64,
    /// Averages across member events
    pub mean_value: f64,
    /// Mean of member mean deviations
    pub mean_deviation: f64,
    /// Mean rpm across members
    pub mean_rpm: Option<f64>,
    /// Mean load across members
    pub mean_load: Option<f64>,
    /// Mean throttle across members
    pub mean_throttle: Option<f64>,
}

/// Summary over the samples of kept events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Samples that passed the regime filter
    pub total_samples: usize,
    /// Samples inside kept events
    pub event_samples: usize,
    /// Kept samples classified `TypeA`
    pub type_a_samples: usize,
    /// Kept samples classified `TypeB`
    pub type_b_samples: usize,
    /// Kept events
    pub event_count: usize,
    /// Event groups
    pub group_count: usize,
    /// Groups of `TypeA` events
    pub type_a_groups: usize,
    /// Groups of `TypeB` events
    pub type_b_groups: usize,
    /// Signed mean over kept samples
    pub mean_deviation: f64,
    /// Absolute mean over kept samples
    pub mean_abs_deviation: f64,
    /// Largest absolute deviation over kept samples
    pub max_abs_deviation: f64,
    /// Most severe value seen
    pub peak_value: f64,
    /// Kept samples as a share of `total_samples`
    pub out_of_target_pct: f64,
    /// Sum of kept event durations
    pub total_event_time: f64,
}

/// Output of one detector run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Detector domain
    pub domain: Domain,
    /// Label for `TypeA`
    pub type_a_label: String,
    /// Label for `TypeB`
    pub type_b_label: String,
    /// Groups, sorted by start
    pub event_groups: Vec<EventGroup>,
    /// Kept events
    pub events: Vec<Event>,
    /// Summary over kept events
    pub statistics: Statistics,
    /// Columns the detector read, by channel
    pub columns: BTreeMap<Channel, String>,
    /// Interval estimate used for durations
    pub sampling_interval: f64,
    /// Why the detector could not run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResult {
    /// An empty result for `domain`
    pub fn empty(domain: Domain, labels: (&str, &str), sampling_interval: f64) -> Self {
        Self {
            domain,
            type_a_label: labels.0.to_string(),
            type_b_label: labels.1.to_string(),
            event_groups: Vec::new(),
            events: Vec::new(),
            statistics: Statistics::default(),
            columns: BTreeMap::new(),
            sampling_interval,
            error: None,
        }
    }

    /// True when the detector ran
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
