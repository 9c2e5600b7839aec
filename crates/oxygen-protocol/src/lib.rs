//! FDO2 Protocol Implementation
//!
//! The PyroScience FDO2 optical oxygen sensor speaks an ASCII command protocol over
//! UART. Each command is a `\r`-terminated chunk starting with a 5-character header
//! such as `#MRAW`, followed by space-separated decimal arguments.
//!
//! Chunk framing ([`ChunkDecoder`], [`ChunkEncoder`]) and command semantics
//! ([`Request`], [`Response`]) are separate layers.

mod chunk;
mod command;
mod device;
mod error;
mod sensor;

pub use chunk::{ChunkDecoder, ChunkEncoder, ChunkStatus, DELIMITER};
pub use command::{
    CommandType, Measurement, Request, RequestBuffer, Response, ResponseBuffer, Version,
    MAX_REQUEST_LEN, MAX_RESPONSE_LEN,
};
pub use device::{Device, RequestSender, ResponseReceiver};
pub use error::{ChunkError, CommandError, DeviceError, ParseError, SensorError};
pub use sensor::{
    Action, OxygenReading, OxygenSensorConfig, Sensor, SetupStatus, StateMachine,
};
