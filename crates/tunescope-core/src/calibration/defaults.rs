//! Map identifiers and fallback constants
//!
//! Every domain accessor on [`CalibrationStore`](super::CalibrationStore)
//! falls back to one of these constants when its map or axis is absent.

use serde::{Deserialize, Serialize};

/// Base spark advance (degrees)
pub const DEFAULT_SPARK_ADVANCE: f64 = 15.0;
/// Boost target (kPa absolute)
pub const DEFAULT_BOOST_TARGET_KPA: f64 = 180.0;
/// Overboost ceiling (kPa absolute)
pub const DEFAULT_BOOST_LIMIT_KPA: f64 = 250.0;
/// Load limit
pub const DEFAULT_LOAD_LIMIT: f64 = 2.5;
/// Power enrichment lambda target
pub const DEFAULT_PE_LAMBDA: f64 = 0.82;
/// Load at or above which PE may engage
pub const DEFAULT_PE_ENABLE_LOAD: f64 = 1.0;
/// Throttle (%) at or above which PE may engage
pub const DEFAULT_PE_ENABLE_THROTTLE: f64 = 70.0;
/// Maximum knock retard (degrees)
pub const DEFAULT_KNOCK_MAX_RETARD: f64 = 8.0;
/// Knock retard step (degrees)
pub const DEFAULT_KNOCK_RETARD_STEP: f64 = 1.0;
/// Lowest IAM before the ECU stops learning
pub const DEFAULT_KNOCK_IAM_FLOOR: f64 = 0.7;
/// Low-speed fan turn-on temperature (°C)
pub const DEFAULT_FAN_LOW_ON: f64 = 95.0;
/// High-speed fan turn-on temperature (°C)
pub const DEFAULT_FAN_HIGH_ON: f64 = 102.0;
/// Intake air warning temperature (°C)
pub const DEFAULT_IAT_WARNING: f64 = 50.0;
/// Intake air critical temperature (°C)
pub const DEFAULT_IAT_CRITICAL: f64 = 65.0;
/// Rev limit (rpm)
pub const DEFAULT_REV_LIMIT: f64 = 7000.0;

const _: () = assert!(DEFAULT_FAN_LOW_ON < DEFAULT_FAN_HIGH_ON);
const _: () = assert!(DEFAULT_IAT_WARNING < DEFAULT_IAT_CRITICAL);

/// Identifiers of the calibration maps the analyses read
///
/// Table rows are always indexed by RPM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapIds {
    /// Base fuel table (RPM x load)
    pub fuel_table: String,
    /// Fuel table row axis
    pub fuel_rpm_axis: String,
    /// Fuel table column axis
    pub fuel_load_axis: String,

    /// Base spark table (RPM x load)
    pub spark_table: String,
    /// Spark table row axis
    pub spark_rpm_axis: String,
    /// Spark table column axis
    pub spark_load_axis: String,

    /// Boost target table (RPM x throttle)
    pub boost_target_table: String,
    /// Boost target row axis
    pub boost_target_rpm_axis: String,
    /// Boost target column axis
    pub boost_target_throttle_axis: String,

    /// Boost limit curve
    pub boost_limit: String,
    /// Boost limit axis
    pub boost_limit_rpm_axis: String,

    /// Load limit curve
    pub load_limit: String,
    /// Load limit axis
    pub load_limit_rpm_axis: String,

    /// Power enrichment lambda table (RPM x load)
    pub pe_lambda_table: String,
    /// PE lambda row axis
    pub pe_lambda_rpm_axis: String,
    /// PE lambda column axis
    pub pe_lambda_load_axis: String,

    /// Indexed by the fuel table RPM axis
    pub pe_enable_load: String,
    /// Indexed by the fuel table RPM axis
    pub pe_enable_throttle: String,

    /// Knock control scalars
    pub knock_max_retard: String,
    /// Retard per knock event
    pub knock_retard_step: String,
    /// IAM floor
    pub knock_iam_floor: String,

    /// Fan and intake temperature scalars
    pub fan_low_on: String,
    /// High speed fan on
    pub fan_high_on: String,
    /// IAT warning
    pub iat_warning: String,
    /// IAT critical
    pub iat_critical: String,
    /// Fuel cut rev limit
    pub rev_limit: String,
}

impl Default for MapIds {
    fn default() -> Self {
        Self {
            fuel_table: "fuel_base".to_string(),
            fuel_rpm_axis: "fuel_base_rpm".to_string(),
            fuel_load_axis: "fuel_base_load".to_string(),
            spark_table: "spark_base".to_string(),
            spark_rpm_axis: "spark_base_rpm".to_string(),
            spark_load_axis: "spark_base_load".to_string(),
            boost_target_table: "boost_target".to_string(),
            boost_target_rpm_axis: "boost_target_rpm".to_string(),
            boost_target_throttle_axis: "boost_target_throttle".to_string(),
            boost_limit: "boost_limit".to_string(),
            boost_limit_rpm_axis: "boost_limit_rpm".to_string(),
            load_limit: "load_limit".to_string(),
            load_limit_rpm_axis: "load_limit_rpm".to_string(),
            pe_lambda_table: "pe_lambda_target".to_string(),
            pe_lambda_rpm_axis: "pe_lambda_rpm".to_string(),
            pe_lambda_load_axis: "pe_lambda_load".to_string(),
            pe_enable_load: "pe_enable_load".to_string(),
            pe_enable_throttle: "pe_enable_throttle".to_string(),
            knock_max_retard: "knock_max_retard".to_string(),
            knock_retard_step: "knock_retard_step".to_string(),
            knock_iam_floor: "knock_iam_floor".to_string(),
            fan_low_on: "fan_low_on".to_string(),
            fan_high_on: "fan_high_on".to_string(),
            iat_warning: "iat_warning".to_string(),
            iat_critical: "iat_critical".to_string(),
            rev_limit: "rev_limit".to_string(),
        }
    }
}
