//! Domain accessors over the calibration maps
//!
//! Each accessor composes the generic lookups and falls back to the constants
//! in [`defaults`](super::defaults) when a map or axis is missing, so analyses
//! still run against a partial calibration.

use serde::{Deserialize, Serialize};

use super::defaults::*;
use super::interpolate::interpolate_1d;
use super::store::CalibrationStore;

/// Power enrichment entry thresholds at one RPM
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeEnable {
    /// Minimum load
    pub load: f64,
    /// Minimum throttle (%)
    pub throttle: f64,
}

/// Knock control parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnockParameters {
    /// Largest retard the ECU will apply (degrees, positive)
    pub max_retard: f64,
    /// Retard applied per knock event (degrees, positive)
    pub retard_step: f64,
    /// IAM below which knock learning is considered poor
    pub iam_floor: f64,
}

/// Radiator fan switch points (°C)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FanThresholds {
    /// Low speed fan on
    pub low_on: f64,
    /// High speed fan on
    pub high_on: f64,
}

/// Intake air temperature breakpoints (°C)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IatThresholds {
    /// Heat soak starts
    pub warning: f64,
    /// Timing is pulled hard above this
    pub critical: f64,
}

impl CalibrationStore {
    fn parameter_or(&self, id: &str, default: f64) -> f64 {
        self.get_parameter(id).unwrap_or(default)
    }

    /// Base spark advance at (rpm, load)
    pub fn spark_base(&self, rpm: f64, load: f64) -> f64 {
        let ids = self.map_ids();
        self.lookup_2d(
            &ids.spark_table,
            &ids.spark_rpm_axis,
            &ids.spark_load_axis,
            rpm,
            load,
        )
        .unwrap_or(DEFAULT_SPARK_ADVANCE)
    }

    /// Boost target (kPa absolute) at (rpm, throttle)
    pub fn boost_target(&self, rpm: f64, throttle: f64) -> f64 {
        let ids = self.map_ids();
        self.lookup_2d(
            &ids.boost_target_table,
            &ids.boost_target_rpm_axis,
            &ids.boost_target_throttle_axis,
            rpm,
            throttle,
        )
        .unwrap_or(DEFAULT_BOOST_TARGET_KPA)
    }

    /// Overboost ceiling (kPa absolute) at rpm
    pub fn boost_limit(&self, rpm: f64) -> f64 {
        let ids = self.map_ids();
        self.lookup_1d(&ids.boost_limit, &ids.boost_limit_rpm_axis, rpm)
            .unwrap_or(DEFAULT_BOOST_LIMIT_KPA)
    }

    /// Load limit at rpm
    pub fn load_limit(&self, rpm: f64) -> f64 {
        let ids = self.map_ids();
        self.lookup_1d(&ids.load_limit, &ids.load_limit_rpm_axis, rpm)
            .unwrap_or(DEFAULT_LOAD_LIMIT)
    }

    /// Power enrichment lambda target at (rpm, load)
    pub fn pe_lambda_target(&self, rpm: f64, load: f64) -> f64 {
        let ids = self.map_ids();
        self.lookup_2d(
            &ids.pe_lambda_table,
            &ids.pe_lambda_rpm_axis,
            &ids.pe_lambda_load_axis,
            rpm,
            load,
        )
        .unwrap_or(DEFAULT_PE_LAMBDA)
    }

    /// Interpolated PE entry thresholds at rpm
    pub fn pe_enable_thresholds(&self, rpm: f64) -> PeEnable {
        let ids = self.map_ids();
        let axis = self.axis(&ids.fuel_rpm_axis);
        let lookup = |id: &str, default: f64| match (self.get_array(id), axis.as_deref()) {
            (Some(values), Some(axis)) if values.len() == axis.len() => {
                interpolate_1d(&values, axis, rpm)
            }
            _ => default,
        };
        PeEnable {
            load: lookup(&ids.pe_enable_load, DEFAULT_PE_ENABLE_LOAD),
            throttle: lookup(&ids.pe_enable_throttle, DEFAULT_PE_ENABLE_THROTTLE),
        }
    }

    /// Knock control parameters
    pub fn knock_parameters(&self) -> KnockParameters {
        let ids = self.map_ids();
        KnockParameters {
            max_retard: self
                .parameter_or(&ids.knock_max_retard, DEFAULT_KNOCK_MAX_RETARD)
                .abs(),
            retard_step: self
                .parameter_or(&ids.knock_retard_step, DEFAULT_KNOCK_RETARD_STEP)
                .abs(),
            iam_floor: self.parameter_or(&ids.knock_iam_floor, DEFAULT_KNOCK_IAM_FLOOR),
        }
    }

    /// Fan switch points
    pub fn fan_thresholds(&self) -> FanThresholds {
        let ids = self.map_ids();
        let low_on = self.parameter_or(&ids.fan_low_on, DEFAULT_FAN_LOW_ON);
        let high_on = self.parameter_or(&ids.fan_high_on, DEFAULT_FAN_HIGH_ON);
        FanThresholds {
            low_on,
            high_on: high_on.max(low_on),
        }
    }

    /// Intake air temperature breakpoints
    pub fn iat_thresholds(&self) -> IatThresholds {
        let ids = self.map_ids();
        let warning = self.parameter_or(&ids.iat_warning, DEFAULT_IAT_WARNING);
        let critical = self.parameter_or(&ids.iat_critical, DEFAULT_IAT_CRITICAL);
        IatThresholds {
            warning,
            critical: critical.max(warning),
        }
    }

    /// Rev limit (rpm)
    pub fn rev_limit(&self) -> f64 {
        self.parameter_or(&self.map_ids().rev_limit, DEFAULT_REV_LIMIT)
    }
}
