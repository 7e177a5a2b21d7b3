//! Demo data - simulated pull logs for testing
//!
//! Generates a reproducible log of an engine idling, cruising in closed loop
//! and making wide-open-throttle pulls, plus a calibration document whose
//! maps match it. The log goes through the normal ingestion path, so column
//! resolution and unit normalization are exercised too: the commanded target
//! is logged as AFR and intake air temperature in °F.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::log::{IngestOptions, LogDataset, RawLog};
use crate::units::celsius_to_fahrenheit;

const IDLE_RPM: f64 = 850.0;
const PULL_START_RPM: f64 = 3000.0;
const PULL_END_RPM: f64 = 6500.0;
const STOICH_AFR: f64 = 14.7;
const PE_TARGET_AFR: f64 = 11.8;
const ATMOSPHERIC_KPA: f64 = 100.0;

/// Column names the simulator writes
pub const DEMO_COLUMNS: [&str; 16] = [
    "Time (s)",
    "Engine Speed (RPM)",
    "Throttle Position (%)",
    "Calculated Load (g/rev)",
    "Commanded AFR",
    "AFR Sensor #1 (λ)",
    "Short Term Fuel Trim (%)",
    "Long Term Fuel Trim (%)",
    "Manifold Absolute Pressure (kPa)",
    "Boost Target (kPa)",
    "Wastegate Duty (%)",
    "Coolant Temperature",
    "Intake Air Temperature (°F)",
    "Knock Retard",
    "IAM",
    "Ignition Timing",
];

/// Shape of the simulated drive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullSettings {
    /// Logger rate
    pub sample_rate_hz: f64,
    /// Phase lengths, repeated for every pull
    pub idle_seconds: f64,
    /// Closed-loop cruise before each pull
    pub cruise_seconds: f64,
    /// Wide-open throttle pull
    pub pull_seconds: f64,
    /// Overrun after each pull
    pub decel_seconds: f64,
    /// Number of idle/cruise/pull/decel cycles
    pub pulls: usize,
    /// Combined trim the ECU settles at while cruising (%)
    pub cruise_trim_bias: f64,
    /// Lambda error during the second half of each pull
    pub lean_bias: f64,
    /// Peak boost overshoot early in each pull (kPa)
    pub boost_overshoot: f64,
    /// Knock retard late in each pull
    pub knock_burst: bool,
    /// Coolant temperature at the start of the log (°C)
    pub coolant_start: f64,
}

impl Default for PullSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: 20.0,
            idle_seconds: 5.0,
            cruise_seconds: 30.0,
            pull_seconds: 6.0,
            decel_seconds: 4.0,
            pulls: 2,
            cruise_trim_bias: 12.0,
            lean_bias: 0.05,
            boost_overshoot: 25.0,
            knock_burst: true,
            coolant_start: 88.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Cruise,
    /// `progress` runs 0..1 across the pull
    Pull { progress: f64 },
    Decel { progress: f64 },
}

/// Seeded generator of pull logs
pub struct PullSimulator {
    settings: PullSettings,
    rng: StdRng,
}

impl PullSimulator {
    /// Simulator with the default drive
    pub fn new(seed: u64) -> Self {
        Self::with_settings(seed, PullSettings::default())
    }

    /// Simulator with a custom drive
    pub fn with_settings(seed: u64, settings: PullSettings) -> Self {
        Self {
            settings,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Drive being simulated
    pub fn settings(&self) -> &PullSettings {
        &self.settings
    }

    /// Generate the log in its serialized form
    pub fn raw_log(&mut self) -> RawLog {
        let dt = 1.0 / self.settings.sample_rate_hz.max(1.0);
        let mut rows = Vec::new();
        let mut t = 0.0;

        let mut push_phase = |sim: &mut Self, t: &mut f64, seconds: f64, phase: &dyn Fn(f64) -> Phase| {
            let steps = (seconds / dt).round() as usize;
            for step in 0..steps {
                let progress = step as f64 / steps.max(1) as f64;
                rows.push(sim.sample(*t, phase(progress)));
                *t += dt;
            }
        };

        let settings = self.settings.clone();
        push_phase(self, &mut t, settings.idle_seconds, &|_: f64| Phase::Idle);
        for _ in 0..settings.pulls {
            push_phase(self, &mut t, settings.cruise_seconds, &|_: f64| Phase::Cruise);
            push_phase(self, &mut t, settings.pull_seconds, &|p: f64| Phase::Pull { progress: p });
            push_phase(self, &mut t, settings.decel_seconds, &|p: f64| Phase::Decel { progress: p });
        }
        push_phase(self, &mut t, settings.idle_seconds, &|_: f64| Phase::Idle);

        RawLog {
            columns: DEMO_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// Generate and ingest the log
    pub fn dataset(&mut self) -> LogDataset {
        LogDataset::from_raw(self.raw_log(), &IngestOptions::default())
    }

    fn noise(&mut self, amplitude: f64) -> f64 {
        self.rng.gen_range(-1.0..1.0) * amplitude
    }

    fn sample(&mut self, t: f64, phase: Phase) -> Vec<Value> {
        let s = self.settings.clone();
        let ltft = s.cruise_trim_bias * 0.4;

        let (rpm, throttle, load, target_afr) = match phase {
            Phase::Idle => (IDLE_RPM + 20.0 * (t * 2.5).sin(), 2.0, 0.25, STOICH_AFR),
            Phase::Cruise => (2500.0 + 300.0 * (t * 0.2).sin(), 15.0, 0.5, STOICH_AFR),
            Phase::Pull { progress } => (
                PULL_START_RPM + (PULL_END_RPM - PULL_START_RPM) * progress,
                100.0,
                0.8 + 1.4 * progress.min(1.0),
                PE_TARGET_AFR,
            ),
            Phase::Decel { progress } => (
                PULL_END_RPM - (PULL_END_RPM - 2000.0) * progress,
                0.0,
                0.2,
                STOICH_AFR,
            ),
        };
        let rpm = rpm + self.noise(10.0);
        let target_lambda = target_afr / STOICH_AFR;

        let (measured, stft) = match phase {
            Phase::Pull { progress } => {
                let bias = if progress >= 0.5 { s.lean_bias } else { 0.0 };
                (target_lambda + bias + self.noise(0.004), 0.0)
            }
            Phase::Cruise => (1.0 + self.noise(0.01), s.cruise_trim_bias - ltft + self.noise(1.0)),
            _ => (1.0 + self.noise(0.01), self.noise(2.0)),
        };

        let (boost, boost_target, wgdc) = match phase {
            Phase::Pull { progress } => {
                let target = 200.0;
                let spool = (progress * 5.0).min(1.0);
                let overshoot = if (0.2..0.4).contains(&progress) {
                    s.boost_overshoot * ((progress - 0.2) / 0.2 * std::f64::consts::PI).sin()
                } else {
                    0.0
                };
                let actual = ATMOSPHERIC_KPA + (target - ATMOSPHERIC_KPA) * spool + overshoot;
                (actual + self.noise(1.5), target, 55.0 + self.noise(2.0))
            }
            Phase::Decel { .. } => (30.0 + self.noise(2.0), ATMOSPHERIC_KPA, 0.0),
            _ => (35.0 + load * 40.0 + self.noise(1.0), ATMOSPHERIC_KPA, 0.0),
        };

        let knock = match phase {
            Phase::Pull { progress } if s.knock_burst && (0.6..0.7).contains(&progress) => {
                -(2.0 + 3.0 * ((progress - 0.6) / 0.1))
            }
            _ => 0.0,
        };

        let coolant = s.coolant_start + 0.02 * t + self.noise(0.2);
        let iat_c = match phase {
            Phase::Pull { progress } => 30.0 + 15.0 * progress,
            _ => 30.0,
        } + self.noise(0.3);
        let timing = match phase {
            Phase::Pull { .. } => 16.0 + knock,
            _ => 10.0 + rpm / 300.0,
        };

        [
            t,
            rpm,
            throttle,
            load,
            target_afr,
            measured,
            stft,
            ltft,
            boost,
            boost_target,
            wgdc,
            coolant,
            celsius_to_fahrenheit(iat_c),
            knock,
            1.0,
            timing,
        ]
        .into_iter()
        .map(|v| json!((v * 1000.0).round() / 1000.0))
        .collect()
    }
}

/// A calibration matching the simulated engine
pub fn calibration_document() -> Value {
    let fuel_rpm = [800.0, 1600.0, 2400.0, 3200.0, 4000.0, 4800.0, 5600.0, 6400.0];
    let fuel_load = [0.2, 0.4, 0.6, 0.8, 1.0, 1.4, 1.8, 2.2];
    let fuel_rows: Vec<Vec<f64>> = fuel_rpm
        .iter()
        .enumerate()
        .map(|(r, _)| {
            fuel_load
                .iter()
                .enumerate()
                .map(|(c, _)| 20.0 + r as f64 * 2.5 + c as f64 * 6.0)
                .collect()
        })
        .collect();
    let spark_rows: Vec<String> = fuel_rpm
        .iter()
        .map(|rpm| {
            fuel_load
                .iter()
                .map(|load| format!("{:.1}", 10.0 + rpm / 400.0 - load * 4.0))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();

    json!({
        "cal_id": "DEMO-0001",
        "car_id": "demo",
        "rom_id": "SIM-2.0T",
        "version": "1.0",
        "meta": { "description": "Simulated 2.0L turbocharged engine" },
        "maps": [
            { "id": "fuel_base_rpm", "data": fuel_rpm },
            { "id": "fuel_base_load", "data": fuel_load },
            { "id": "fuel_base", "data": fuel_rows },
            { "id": "spark_base_rpm", "data": "800,1600,2400,3200,4000,4800,5600,6400" },
            { "id": "spark_base_load", "data": "0.2,0.4,0.6,0.8,1.0,1.4,1.8,2.2" },
            { "id": "spark_base", "data": spark_rows },
            { "id": "boost_target_rpm", "data": [2000, 3000, 4000, 5000, 6000] },
            { "id": "boost_target_throttle", "data": [0, 30, 60, 80, 100] },
            { "id": "boost_target", "data": [
                [100, 100, 110, 130, 150],
                [100, 110, 140, 170, 200],
                [100, 120, 160, 190, 200],
                [100, 120, 160, 190, 200],
                [100, 115, 150, 180, 190]
            ] },
            { "id": "boost_limit_rpm", "data": [2000, 4000, 6000] },
            { "id": "boost_limit", "data": [240, 250, 235] },
            { "id": "load_limit_rpm", "data": [2000, 4000, 6000] },
            { "id": "load_limit", "data": [2.0, 2.4, 2.2] },
            { "id": "pe_lambda_rpm", "data": [2000, 4000, 6000] },
            { "id": "pe_lambda_load", "data": [1.0, 1.5, 2.0] },
            { "id": "pe_lambda_target", "data": [
                [0.85, 0.82, 0.80],
                [0.84, 0.81, 0.79],
                [0.83, 0.80, 0.78]
            ] },
            { "id": "pe_enable_load", "data": [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0] },
            { "id": "pe_enable_throttle", "data": [70, 70, 70, 70, 70, 70, 70, 70] },
            { "id": "knock_max_retard", "value": 8.0 },
            { "id": "knock_retard_step", "value": "1.4" },
            { "id": "knock_iam_floor", "value": 0.7 },
            { "id": "fan_low_on", "value": 96 },
            { "id": "fan_high_on", "value": 102 },
            { "id": "iat_warning", "value": 50 },
            { "id": "iat_critical", "value": 65 },
            { "id": "rev_limit", "value": 6800 }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationStore;
    use crate::log::Channel;

    #[test]
    fn test_same_seed_same_log() {
        let a = PullSimulator::new(7).raw_log();
        let b = PullSimulator::new(7).raw_log();
        assert_eq!(a.rows, b.rows);
        assert_ne!(a.rows, PullSimulator::new(8).raw_log().rows);
    }

    #[test]
    fn test_row_count() {
        let settings = PullSettings::default();
        let log = PullSimulator::new(1).raw_log();
        let seconds = settings.idle_seconds * 2.0
            + settings.pulls as f64
                * (settings.cruise_seconds + settings.pull_seconds + settings.decel_seconds);
        assert_eq!(log.rows.len(), (seconds * settings.sample_rate_hz).round() as usize);
        assert!(log.rows.iter().all(|r| r.len() == DEMO_COLUMNS.len()));
    }

    #[test]
    fn test_ingestion_binds_every_channel() {
        let dataset = PullSimulator::new(1).dataset();
        for channel in Channel::ALL {
            assert!(dataset.has(channel), "{channel:?} not bound");
        }
        assert!((dataset.sampling_interval() - 0.05).abs() < 1e-6);
        // Commanded AFR is converted to lambda
        let targets = dataset.channel_values(Channel::LambdaTarget);
        assert!(targets.iter().all(|t| *t > 0.7 && *t < 1.1));
    }

    #[test]
    fn test_calibration_loads() {
        let mut store = CalibrationStore::new();
        assert!(store.parse_value(calibration_document()));
        assert_eq!(store.table_shape("fuel_base"), Some((8, 8)));
        assert_eq!(store.table_shape("spark_base"), Some((8, 8)));
        assert_eq!(store.fan_thresholds().high_on, 102.0);
        assert_eq!(store.knock_parameters().retard_step, 1.4);
    }
}
