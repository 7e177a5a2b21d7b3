//! Unit Conversion Functions
//!
//! Conversions applied while normalizing log channels:
//! - Air-Fuel Ratio: Lambda ↔ AFR (gasoline=14.7, E85=9.8, etc.)
//! - Temperature: °C ↔ °F

/// Stoichiometric AFR for a fuel type name
///
/// Unknown names fall back to gasoline.
pub fn stoich_afr(fuel_type: &str) -> f64 {
    match fuel_type.to_lowercase().as_str() {
        "gasoline" | "petrol" => 14.7,
        "e85" => 9.8,
        "methanol" => 6.4,
        "ethanol" => 9.0,
        "lpg" | "propane" => 15.5,
        "cng" | "natural_gas" => 17.2,
        "diesel" => 14.5,
        _ => 14.7,
    }
}

/// Convert Lambda to AFR for the given stoichiometric ratio
pub fn lambda_to_afr(lambda: f64, stoich: f64) -> f64 {
    lambda * stoich
}

/// Convert AFR to Lambda for the given stoichiometric ratio
pub fn afr_to_lambda(afr: f64, stoich: f64) -> f64 {
    if stoich <= 0.0 {
        return afr;
    }
    afr / stoich
}

/// Values above this on a lambda channel are assumed to be AFR
pub const AFR_DETECTION_FLOOR: f64 = 2.0;

/// Whether a reading from a lambda channel looks like an AFR value
pub fn looks_like_afr(value: f64) -> bool {
    value > AFR_DETECTION_FLOOR
}

/// Convert Celsius to Fahrenheit
pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Convert Fahrenheit to Celsius
pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lambda_afr_round_trip() {
        let stoich = stoich_afr("gasoline");
        assert!((lambda_to_afr(1.0, stoich) - 14.7).abs() < 1e-9);
        assert!((afr_to_lambda(11.76, stoich) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_stoich_lookup() {
        assert_eq!(stoich_afr("E85"), 9.8);
        assert_eq!(stoich_afr("unknown"), 14.7);
    }

    #[test]
    fn test_afr_detection() {
        assert!(looks_like_afr(12.5));
        assert!(!looks_like_afr(0.82));
    }

    #[test]
    fn test_temperature() {
        assert!((fahrenheit_to_celsius(212.0) - 100.0).abs() < 1e-9);
        assert!((celsius_to_fahrenheit(0.0) - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_stoich_is_passthrough() {
        assert_eq!(afr_to_lambda(12.0, 0.0), 12.0);
    }
}
