//! Analysis configuration
//!
//! One JSON document covering map identifiers, extra column names, the
//! stoichiometric ratio, every detector's thresholds and the autotune options.
//! Missing keys take their defaults; unknown keys are ignored.
//!
//! ```json
//! {
//!   "stoich_afr": 14.64,
//!   "columns": { "lambda_measured": ["WB O2"] },
//!   "maps": { "fuel_table": "ve_main" },
//!   "afr": { "lean_threshold": 0.04 },
//!   "autotune": { "min_samples": 20, "change_limit_percent": 5.0 }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::autotune::AutotuneOptions;
use crate::calibration::MapIds;
use crate::detect::{
    AfrProfile, BoostProfile, CoolantProfile, DetectionProfile, FuelTrimProfile, IntakeAirProfile,
    KnockProfile,
};
use crate::log::IngestOptions;

/// Errors loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for this structure
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Complete analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Calibration map identifiers
    pub maps: MapIds,
    /// Column candidates and the stoichiometric AFR
    #[serde(flatten)]
    pub ingest: IngestOptions,
    /// Open-loop air/fuel detector
    pub afr: AfrProfile,
    /// Boost detector
    pub boost: BoostProfile,
    /// Short-term trim detector
    pub short_term_trim: FuelTrimProfile,
    /// Long-term trim detector
    pub long_term_trim: FuelTrimProfile,
    /// Coolant temperature detector
    pub coolant: CoolantProfile,
    /// Intake air temperature detector
    pub intake_air: IntakeAirProfile,
    /// Knock retard detector
    pub knock: KnockProfile,
    /// Fuel table correction settings
    pub autotune: AutotuneOptions,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            maps: MapIds::default(),
            ingest: IngestOptions::default(),
            afr: AfrProfile::default(),
            boost: BoostProfile::default(),
            short_term_trim: FuelTrimProfile::short_term(),
            long_term_trim: FuelTrimProfile::long_term(),
            coolant: CoolantProfile::default(),
            intake_air: IntakeAirProfile::default(),
            knock: KnockProfile::default(),
            autotune: AutotuneOptions::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse JSON, layering it over the defaults
    ///
    /// Partial sections keep the defaults of the section they override, so
    /// `{"long_term_trim": {"tolerance": 4}}` still gets long-term thresholds.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let overlay: Value = serde_json::from_str(content)?;
        let mut merged = serde_json::to_value(Self::default())?;
        merge(&mut merged, overlay);
        Ok(serde_json::from_value(merged)?)
    }

    /// Serialize as pretty JSON
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// All seven detection profiles in report order
    pub fn profiles(&self) -> Vec<Box<dyn DetectionProfile>> {
        vec![
            Box::new(self.afr.clone()),
            Box::new(self.boost.clone()),
            Box::new(self.short_term_trim.clone()),
            Box::new(self.long_term_trim.clone()),
            Box::new(self.coolant.clone()),
            Box::new(self.intake_air.clone()),
            Box::new(self.knock.clone()),
        ]
    }
}

/// Recursively overlay objects; anything else replaces
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Domain, TrimKind};
    use crate::log::Channel;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_is_default() {
        assert_eq!(AnalysisConfig::from_json("{}").unwrap(), AnalysisConfig::default());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = AnalysisConfig::from_json(
            r#"{"long_term_trim": {"tolerance": 4.0}, "afr": {"lean_threshold": 0.04}}"#,
        )
        .unwrap();
        assert_eq!(config.long_term_trim.kind, TrimKind::LongTerm);
        assert_eq!(config.long_term_trim.adding_threshold, 8.0);
        assert_eq!(config.long_term_trim.tolerance, 4.0);
        assert_eq!(config.afr.lean_threshold, 0.04);
        assert_eq!(config.afr.rich_threshold, 0.05);
    }

    #[test]
    fn test_flattened_ingest_keys() {
        let config = AnalysisConfig::from_json(
            r#"{"stoich_afr": 14.64, "columns": {"lambda_measured": ["WB O2"]}, "unknown": 1}"#,
        )
        .unwrap();
        assert_eq!(config.ingest.stoich_afr, 14.64);
        assert_eq!(
            config.ingest.candidates_for(Channel::LambdaMeasured)[0],
            "WB O2"
        );
    }

    #[test]
    fn test_profiles_cover_every_domain() {
        let domains: Vec<Domain> = AnalysisConfig::default()
            .profiles()
            .iter()
            .map(|p| p.domain())
            .collect();
        assert_eq!(
            domains,
            vec![
                Domain::Afr,
                Domain::Boost,
                Domain::ShortTermTrim,
                Domain::LongTermTrim,
                Domain::CoolantTemp,
                Domain::IntakeAirTemp,
                Domain::Knock,
            ]
        );
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(
            AnalysisConfig::from_json("{"),
            Err(ConfigError::Parse(_))
        ));
    }
}
