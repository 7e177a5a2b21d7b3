//! Logged channels and the typed row
//!
//! The ingestion adapter binds each channel to one physical column once per
//! file; analyses then read typed optional fields instead of string keys.

use serde::{Deserialize, Serialize};

/// A logical log channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Engine speed
    Rpm,
    /// Throttle position (%)
    Throttle,
    /// Engine load (g/rev or similar)
    Load,
    /// Commanded lambda
    LambdaTarget,
    /// Wideband lambda
    LambdaMeasured,
    /// Short-term fuel trim (%)
    ShortTermTrim,
    /// Long-term fuel trim (%)
    LongTermTrim,
    /// Manifold absolute pressure (kPa)
    Boost,
    /// Boost target (kPa absolute)
    BoostTarget,
    /// Wastegate duty (%)
    WastegateDuty,
    /// Coolant temperature (°C)
    CoolantTemp,
    /// Intake air temperature (°C)
    IntakeAirTemp,
    /// Knock retard (degrees, zero or negative)
    KnockRetard,
    /// Ignition advance multiplier
    Iam,
    /// Ignition timing (degrees)
    SparkAdvance,
}

impl Channel {
    /// Every channel, in resolution order
    pub const ALL: [Channel; 15] = [
        Channel::Rpm,
        Channel::Throttle,
        Channel::Load,
        Channel::LambdaTarget,
        Channel::LambdaMeasured,
        Channel::ShortTermTrim,
        Channel::LongTermTrim,
        Channel::Boost,
        Channel::BoostTarget,
        Channel::WastegateDuty,
        Channel::CoolantTemp,
        Channel::IntakeAirTemp,
        Channel::KnockRetard,
        Channel::Iam,
        Channel::SparkAdvance,
    ];

    /// Human readable role name
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Rpm => "engine speed",
            Channel::Throttle => "throttle position",
            Channel::Load => "engine load",
            Channel::LambdaTarget => "target lambda",
            Channel::LambdaMeasured => "measured lambda",
            Channel::ShortTermTrim => "short term fuel trim",
            Channel::LongTermTrim => "long term fuel trim",
            Channel::Boost => "manifold pressure",
            Channel::BoostTarget => "boost target",
            Channel::WastegateDuty => "wastegate duty",
            Channel::CoolantTemp => "coolant temperature",
            Channel::IntakeAirTemp => "intake air temperature",
            Channel::KnockRetard => "knock retard",
            Channel::Iam => "ignition advance multiplier",
            Channel::SparkAdvance => "spark advance",
        }
    }

    /// Column names tried for this channel, highest priority first
    pub fn default_candidates(&self) -> &'static [&'static str] {
        match self {
            Channel::Rpm => &["RPM", "Engine Speed (RPM)", "Engine RPM", "Engine Speed"],
            Channel::Throttle => &["Throttle Position (%)", "Throttle Position", "TPS", "Throttle"],
            Channel::Load => &["Calculated Load (g/rev)", "Engine Load", "Load", "Calculated Load"],
            Channel::LambdaTarget => &[
                "Commanded AFR",
                "Target AFR",
                "AFR Target",
                "Lambda Target",
                "Commanded Lambda",
            ],
            Channel::LambdaMeasured => &[
                "AFR Sensor #1",
                "Measured AFR",
                "Wideband AFR",
                "Lambda",
                "AFR",
            ],
            Channel::ShortTermTrim => &["Short Term Fuel Trim (%)", "STFT", "Fuel Trim Short Term"],
            Channel::LongTermTrim => &["Long Term Fuel Trim (%)", "LTFT", "Fuel Trim Long Term"],
            Channel::Boost => &[
                "Manifold Absolute Pressure (kPa)",
                "MAP",
                "Manifold Pressure",
                "Boost Pressure",
            ],
            Channel::BoostTarget => &["Boost Target (kPa)", "Boost Target", "Target Boost"],
            Channel::WastegateDuty => &["Wastegate Duty (%)", "WGDC", "Wastegate Duty Cycle"],
            Channel::CoolantTemp => &["Coolant Temperature", "Coolant Temp", "ECT", "CLT"],
            Channel::IntakeAirTemp => &["Intake Air Temperature", "Intake Temp", "IAT"],
            Channel::KnockRetard => &["Knock Retard", "Feedback Knock", "Knock Correction"],
            Channel::Iam => &["IAM", "Ignition Advance Multiplier", "Dynamic Advance Multiplier"],
            Channel::SparkAdvance => &["Ignition Timing", "Spark Advance", "Timing Advance"],
        }
    }

    /// Channels carrying lambda (may be logged as AFR)
    pub fn is_lambda(&self) -> bool {
        matches!(self, Channel::LambdaTarget | Channel::LambdaMeasured)
    }

    /// Channels carrying a temperature (may be logged in °F)
    pub fn is_temperature(&self) -> bool {
        matches!(self, Channel::CoolantTemp | Channel::IntakeAirTemp)
    }
}

/// One log sample with typed channel values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    /// Seconds from the start of the log
    pub time: f64,
    /// Engine speed
    pub rpm: Option<f64>,
    /// Throttle position (%)
    pub throttle: Option<f64>,
    /// Engine load
    pub load: Option<f64>,
    /// Commanded lambda
    pub lambda_target: Option<f64>,
    /// Wideband lambda
    pub lambda_measured: Option<f64>,
    /// STFT (%)
    pub short_term_trim: Option<f64>,
    /// LTFT (%)
    pub long_term_trim: Option<f64>,
    /// Manifold absolute pressure (kPa)
    pub boost: Option<f64>,
    /// Boost target (kPa)
    pub boost_target: Option<f64>,
    /// Wastegate duty (%)
    pub wastegate_duty: Option<f64>,
    /// Coolant temperature (°C)
    pub coolant_temp: Option<f64>,
    /// Intake air temperature (°C)
    pub intake_air_temp: Option<f64>,
    /// Knock retard (degrees)
    pub knock_retard: Option<f64>,
    /// Ignition advance multiplier
    pub iam: Option<f64>,
    /// Ignition timing (degrees)
    pub spark_advance: Option<f64>,
}

impl LogRow {
    /// Create an empty row at `time`
    pub fn at(time: f64) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }

    /// Read a channel
    pub fn get(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Rpm => self.rpm,
            Channel::Throttle => self.throttle,
            Channel::Load => self.load,
            Channel::LambdaTarget => self.lambda_target,
            Channel::LambdaMeasured => self.lambda_measured,
            Channel::ShortTermTrim => self.short_term_trim,
            Channel::LongTermTrim => self.long_term_trim,
            Channel::Boost => self.boost,
            Channel::BoostTarget => self.boost_target,
            Channel::WastegateDuty => self.wastegate_duty,
            Channel::CoolantTemp => self.coolant_temp,
            Channel::IntakeAirTemp => self.intake_air_temp,
            Channel::KnockRetard => self.knock_retard,
            Channel::Iam => self.iam,
            Channel::SparkAdvance => self.spark_advance,
        }
    }

    /// Mutable access to a channel slot
    pub fn slot_mut(&mut self, channel: Channel) -> &mut Option<f64> {
        match channel {
            Channel::Rpm => &mut self.rpm,
            Channel::Throttle => &mut self.throttle,
            Channel::Load => &mut self.load,
            Channel::LambdaTarget => &mut self.lambda_target,
            Channel::LambdaMeasured => &mut self.lambda_measured,
            Channel::ShortTermTrim => &mut self.short_term_trim,
            Channel::LongTermTrim => &mut self.long_term_trim,
            Channel::Boost => &mut self.boost,
            Channel::BoostTarget => &mut self.boost_target,
            Channel::WastegateDuty => &mut self.wastegate_duty,
            Channel::CoolantTemp => &mut self.coolant_temp,
            Channel::IntakeAirTemp => &mut self.intake_air_temp,
            Channel::KnockRetard => &mut self.knock_retard,
            Channel::Iam => &mut self.iam,
            Channel::SparkAdvance => &mut self.spark_advance,
        }
    }

    /// Builder-style setter
    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        *self.slot_mut(channel) = Some(value);
        self
    }
}
