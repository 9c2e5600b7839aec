//! Flow Sensor Error Types

use data_validator::ValidationError;
use thiserror::Error;

/// I2C transaction failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("Operation not supported by the bus")]
    NotSupported,

    #[error("I2C write failed")]
    WriteError,

    #[error("I2C read failed")]
    ReadError,

    #[error("Invalid transfer arguments")]
    InvalidArguments,

    #[error("CRC mismatch: expected {expected:02X}, got {actual:02X}")]
    CrcMismatch { expected: u8, actual: u8 },

    /// The device NACKed a read because no new measurement is ready
    #[error("No new data from device")]
    NoNewData,
}

/// Why one setup or measurement step has to be repeated
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum StepError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unexpected product number {found:#010X}")]
    UnexpectedProduct { found: u32 },

    #[error("Conversion factors not loaded")]
    NotIdentified,
}

/// Fatal sensor states; they persist until [`crate::Sensor::reinitialize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("Sensor setup failed after {retries} retries")]
    SetupFailed { retries: u32 },

    #[error("Sensor measurement failed after {retries} retries")]
    MeasurementFailed { retries: u32 },
}
