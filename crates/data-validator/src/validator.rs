//! Data Validator for Range Checking

use crate::error::{Quantity, ValidationError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Flow valid range (L/min)
    pub flow_range: (f64, f64),
    /// SpO2 valid range (%)
    pub spo2_range: (f64, f64),
    /// Heart rate valid range (bpm)
    pub heart_rate_range: (f64, f64),
    /// Oxygen partial pressure valid range (hPa)
    pub po2_range: (f64, f64),
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            flow_range: (-200.0, 200.0),
            spo2_range: (0.0, 100.0),
            heart_rate_range: (18.0, 321.0),
            po2_range: (0.0, 2000.0),
        }
    }
}

/// Data validator for decoded sensor values
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a single value against an inclusive range
    pub fn validate_range(
        &self,
        quantity: Quantity,
        value: f64,
        range: (f64, f64),
    ) -> Result<(), ValidationError> {
        // NaN fails both comparisons, so test for containment rather than exclusion
        if value >= range.0 && value <= range.1 {
            Ok(())
        } else {
            debug!(%quantity, value, min = range.0, max = range.1, "Value out of range");
            Err(ValidationError::OutOfRange {
                quantity,
                value,
                min: range.0,
                max: range.1,
            })
        }
    }

    /// Validate a flow reading
    pub fn validate_flow(&self, flow: f64) -> Result<(), ValidationError> {
        self.validate_range(Quantity::Flow, flow, self.config.flow_range)
    }

    /// Validate an SpO2 reading
    pub fn validate_spo2(&self, spo2: f64) -> Result<(), ValidationError> {
        self.validate_range(Quantity::Spo2, spo2, self.config.spo2_range)
    }

    /// Validate a heart rate reading
    pub fn validate_heart_rate(&self, heart_rate: f64) -> Result<(), ValidationError> {
        self.validate_range(Quantity::HeartRate, heart_rate, self.config.heart_rate_range)
    }

    /// Validate an oxygen partial pressure reading
    pub fn validate_po2(&self, po2: f64) -> Result<(), ValidationError> {
        self.validate_range(Quantity::Po2, po2, self.config.po2_range)
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_flow_range() {
        let validator = Validator::default();
        assert!(validator.validate_flow(0.0).is_ok());
        assert!(validator.validate_flow(-200.0).is_ok());
        assert!(validator.validate_flow(200.0).is_ok());
        assert!(validator.validate_flow(200.5).is_err());
        assert!(validator.validate_flow(-250.0).is_err());
    }

    #[test]
    fn test_nan_is_rejected() {
        let validator = Validator::default();
        assert!(validator.validate_flow(f64::NAN).is_err());
        assert!(validator.validate_spo2(f64::NAN).is_err());
    }

    #[test]
    fn test_out_of_range_error_fields() {
        let validator = Validator::default();
        let err = validator.validate_spo2(101.0).unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfRange {
                quantity: Quantity::Spo2,
                value: 101.0,
                min: 0.0,
                max: 100.0,
            }
        );
        assert_eq!(err.to_string(), "SpO2 101 % outside [0, 100]");
    }

    #[test]
    fn test_heart_rate_and_po2() {
        let validator = Validator::default();
        assert!(validator.validate_heart_rate(72.0).is_ok());
        assert!(validator.validate_heart_rate(511.0).is_err());
        assert!(validator.validate_po2(212.0).is_ok());
        assert!(validator.validate_po2(-1.0).is_err());
    }

    proptest! {
        #[test]
        fn prop_custom_range_is_inclusive(min in -1000.0f64..0.0, max in 0.0f64..1000.0, value in -2000.0f64..2000.0) {
            let validator = Validator::new(ValidationConfig {
                flow_range: (min, max),
                ..Default::default()
            });
            let inside = value >= min && value <= max;
            prop_assert_eq!(validator.validate_flow(value).is_ok(), inside);
        }
    }
}
