//! FDO2 Command Codec
//!
//! Maps chunk payloads to typed requests and responses.

use crate::chunk::DELIMITER;
use crate::error::{CommandError, ParseError};
use core::fmt::Write;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Header length, start character included
const HEADER_LEN: usize = 5;
/// Digits in the longest argument, -2^31
const MAX_FIELD_DIGITS: usize = 11;
const ARG_DELIMITER: u8 = b' ';

const fn max_chunk_len(num_fields: usize) -> usize {
    HEADER_LEN + num_fields * (1 + MAX_FIELD_DIGITS) + 1
}

/// Longest response chunk (`#MRAW` with 8 fields), delimiter included
pub const MAX_RESPONSE_LEN: usize = max_chunk_len(8);
/// Longest request chunk, delimiter included
pub const MAX_REQUEST_LEN: usize = max_chunk_len(2);

pub type ResponseBuffer = heapless::Vec<u8, MAX_RESPONSE_LEN>;
pub type RequestBuffer = heapless::Vec<u8, MAX_REQUEST_LEN>;

/// Command kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandType {
    Vers,
    Mraw,
    Logo,
    Bcst,
    Erro,
}

impl CommandType {
    const ALL: [CommandType; 5] = [
        CommandType::Vers,
        CommandType::Mraw,
        CommandType::Logo,
        CommandType::Bcst,
        CommandType::Erro,
    ];

    pub fn header(self) -> &'static [u8; HEADER_LEN] {
        match self {
            CommandType::Vers => b"#VERS",
            CommandType::Mraw => b"#MRAW",
            CommandType::Logo => b"#LOGO",
            CommandType::Bcst => b"#BCST",
            CommandType::Erro => b"#ERRO",
        }
    }

    fn from_header(header: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.header().as_slice() == header)
    }
}

/// `#VERS` response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub device_id: u8,
    pub num_channels: u8,
    pub firmware_rev: u16,
    /// Bitfield of available sensor types
    pub sensor_types: u8,
}

/// `#MRAW` measurement broadcast
///
/// Fixed-point values in thousandths of the stated unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// Oxygen partial pressure (10^-3 hPa)
    pub po2: i32,
    /// Sample temperature (10^-3 °C)
    pub temperature: i32,
    /// Status bitfield
    pub status: u32,
    /// Dual-phase shift (10^-3 °)
    pub phase_shift: i32,
    /// Signal intensity (10^-3 mV)
    pub signal_intensity: i32,
    /// Ambient light (10^-3 mV)
    pub ambient_light: i32,
    /// Ambient air pressure (10^-3 hPa)
    pub ambient_pressure: i32,
    /// Relative humidity (10^-3 %RH)
    pub relative_humidity: i32,
}

/// Commands sent to the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Query the device version
    Version,
    /// Flash the status LED
    FlashLed,
    /// Start broadcasting `#MRAW` every `interval_ms`
    Broadcast { interval_ms: u16 },
}

/// Messages received from the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Version(Version),
    Measurement(Measurement),
    FlashLed,
    Broadcast { interval_ms: u16 },
    Error { code: i32 },
}

impl Request {
    pub fn command_type(&self) -> CommandType {
        match self {
            Request::Version => CommandType::Vers,
            Request::FlashLed => CommandType::Logo,
            Request::Broadcast { .. } => CommandType::Bcst,
        }
    }

    /// Serialize header and arguments, without the chunk delimiter
    pub fn write(&self) -> Result<RequestBuffer, CommandError> {
        let too_long = |_| CommandError::TooLong {
            max: MAX_REQUEST_LEN,
        };
        let mut text: heapless::String<MAX_REQUEST_LEN> = heapless::String::new();
        for &byte in self.command_type().header() {
            text.push(char::from(byte)).map_err(too_long)?;
        }
        if let Request::Broadcast { interval_ms } = self {
            write!(text, " {}", interval_ms).map_err(|_| CommandError::TooLong {
                max: MAX_REQUEST_LEN,
            })?;
        }
        let mut buffer = RequestBuffer::new();
        buffer
            .extend_from_slice(text.as_bytes())
            .map_err(too_long)?;
        Ok(buffer)
    }
}

impl Response {
    pub fn command_type(&self) -> CommandType {
        match self {
            Response::Version(_) => CommandType::Vers,
            Response::Measurement(_) => CommandType::Mraw,
            Response::FlashLed => CommandType::Logo,
            Response::Broadcast { .. } => CommandType::Bcst,
            Response::Error { .. } => CommandType::Erro,
        }
    }

    /// Parse one chunk, with or without its trailing delimiter
    pub fn parse(chunk: &[u8]) -> Result<Self, CommandError> {
        let body = chunk.strip_suffix(&[DELIMITER]).unwrap_or(chunk);
        if body.len() < HEADER_LEN {
            return Err(CommandError::InvalidHeader);
        }
        let (header, args) = body.split_at(HEADER_LEN);
        let command = CommandType::from_header(header).ok_or(CommandError::InvalidHeader)?;
        let mut args = Args::new(args)?;

        let response = match command {
            CommandType::Vers => Response::Version(Version {
                device_id: args.next()?,
                num_channels: args.next()?,
                firmware_rev: args.next()?,
                sensor_types: args.next()?,
            }),
            CommandType::Mraw => Response::Measurement(Measurement {
                po2: args.next()?,
                temperature: args.next()?,
                status: args.next()?,
                phase_shift: args.next()?,
                signal_intensity: args.next()?,
                ambient_light: args.next()?,
                ambient_pressure: args.next()?,
                relative_humidity: args.next()?,
            }),
            CommandType::Logo => Response::FlashLed,
            CommandType::Bcst => Response::Broadcast {
                interval_ms: args.next()?,
            },
            CommandType::Erro => Response::Error { code: args.next()? },
        };
        args.finish()?;
        Ok(response)
    }
}

/// Cursor over space-separated decimal arguments
struct Args<'a> {
    rest: Option<&'a str>,
}

impl<'a> Args<'a> {
    fn new(raw: &'a [u8]) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Ok(Self { rest: None });
        }
        let text = core::str::from_utf8(raw).map_err(|_| ParseError::InvalidNumber)?;
        match text.strip_prefix(char::from(ARG_DELIMITER)) {
            Some(rest) => Ok(Self { rest: Some(rest) }),
            None => Err(ParseError::InvalidArgDelimiter),
        }
    }

    fn next<T: FromStr>(&mut self) -> Result<T, ParseError> {
        let rest = self.rest.ok_or(ParseError::MissingArg)?;
        let (field, remainder) = match rest.split_once(char::from(ARG_DELIMITER)) {
            Some((field, remainder)) => (field, Some(remainder)),
            None => (rest, None),
        };
        if field.is_empty() {
            return Err(ParseError::InvalidArgDelimiter);
        }
        // Digits only, with an optional leading minus
        let digits = field.strip_prefix('-').unwrap_or(field);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidNumber);
        }
        let value = field.parse().map_err(|_| ParseError::InvalidNumber)?;
        self.rest = remainder;
        Ok(value)
    }

    fn finish(self) -> Result<(), ParseError> {
        match self.rest {
            None => Ok(()),
            Some(_) => Err(ParseError::UnexpectedArg),
        }
    }
}
