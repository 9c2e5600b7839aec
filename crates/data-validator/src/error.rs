//! Validation Error Types

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A physical quantity reported by one of the sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Flow,
    Spo2,
    HeartRate,
    Po2,
}

impl Quantity {
    pub fn unit(self) -> &'static str {
        match self {
            Quantity::Flow => "L/min",
            Quantity::Spo2 => "%",
            Quantity::HeartRate => "bpm",
            Quantity::Po2 => "hPa",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quantity::Flow => "flow",
            Quantity::Spo2 => "SpO2",
            Quantity::HeartRate => "heart rate",
            Quantity::Po2 => "pO2",
        };
        f.write_str(name)
    }
}

/// Rejected sensor data
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ValidationError {
    /// Physically implausible reading
    #[error("{quantity} {value} {unit} outside [{min}, {max}]", unit = .quantity.unit())]
    OutOfRange {
        quantity: Quantity,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Checksum mismatch: computed {computed:#04X}, received {received:#04X}")]
    Checksum { computed: u8, received: u8 },
}
