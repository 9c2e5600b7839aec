//! FDO2 Error Types

use thiserror::Error;

/// Chunk framing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// The chunk did not fit in the buffer and was dropped
    #[error("Chunk exceeds maximum length of {max} bytes")]
    InvalidLength { max: usize },
}

/// Argument parsing failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Missing argument")]
    MissingArg,

    #[error("Unexpected trailing argument")]
    UnexpectedArg,

    #[error("Arguments must be separated by a single space")]
    InvalidArgDelimiter,

    #[error("Argument is not a decimal integer in range")]
    InvalidNumber,
}

/// Command codec errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The chunk does not start with a known command header
    #[error("Unknown command header")]
    InvalidHeader,

    /// The header matched but the arguments did not parse
    #[error("Invalid arguments: {0}")]
    InvalidArgs(#[from] ParseError),

    /// The command does not fit in a request chunk
    #[error("Command does not fit in {max} bytes")]
    TooLong { max: usize },
}

/// Errors talking to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Command(#[from] CommandError),

    /// Not enough TX buffer space to queue a whole request
    #[error("TX buffer has room for {free} of {needed} bytes")]
    TxFull { needed: usize, free: usize },
}

/// Sensor-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The setup retry budget is exhausted; the sensor must be re-initialised
    #[error("Sensor setup failed after {retries} retries")]
    SetupFailed { retries: u32 },

    /// Measurements were requested before setup completed
    #[error("Sensor setup has not completed")]
    NotReady,
}
