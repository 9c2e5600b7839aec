//! FDO2 Device
//!
//! Low-level driver: sends requests and receives responses over a serial channel.

use crate::chunk::{ChunkDecoder, ChunkEncoder, ChunkStatus};
use crate::command::{
    Request, RequestBuffer, Response, MAX_REQUEST_LEN, MAX_RESPONSE_LEN,
};
use crate::error::{ChunkError, CommandError, DeviceError};
use serial_channel::ByteChannel;
use tracing::{debug, warn};

/// Start character of every FDO2 command
const START_MARKER: u8 = b'#';

/// Chunk decoder plus response parser
#[derive(Debug)]
pub struct ResponseReceiver {
    chunks: ChunkDecoder<MAX_RESPONSE_LEN>,
}

impl ResponseReceiver {
    pub const fn new() -> Self {
        Self {
            chunks: ChunkDecoder::with_start_marker(START_MARKER),
        }
    }

    /// Feed one received byte
    pub fn input(&mut self, byte: u8) -> Result<ChunkStatus, ChunkError> {
        self.chunks.input(byte)
    }

    /// Parse the completed chunk, if there is one
    pub fn output(&mut self) -> Option<Result<Response, CommandError>> {
        self.chunks.output().map(Response::parse)
    }
}

impl Default for ResponseReceiver {
    fn default() -> Self {
        Self::new()
    }
}

/// Request serializer plus chunk encoder
#[derive(Debug, Default)]
pub struct RequestSender {
    chunks: ChunkEncoder<MAX_REQUEST_LEN>,
}

impl RequestSender {
    pub const fn new() -> Self {
        Self {
            chunks: ChunkEncoder::new(),
        }
    }

    /// Produce the complete chunk for `request`
    pub fn transform(&self, request: &Request) -> Result<RequestBuffer, DeviceError> {
        let mut buffer = request.write()?;
        self.chunks.encode(&mut buffer)?;
        Ok(buffer)
    }
}

/// FDO2 sensor attached to a serial channel
pub struct Device<C> {
    channel: C,
    responses: ResponseReceiver,
    requests: RequestSender,
    broadcast_interval_ms: u16,
}

impl<C: ByteChannel> Device<C> {
    pub fn new(channel: C, broadcast_interval_ms: u16) -> Self {
        Self {
            channel,
            responses: ResponseReceiver::new(),
            requests: RequestSender::new(),
            broadcast_interval_ms,
        }
    }

    /// Ask for the device version
    pub fn request_version(&mut self) -> Result<(), DeviceError> {
        self.send(&Request::Version)
    }

    /// Flash the device LED
    pub fn flash_led(&mut self) -> Result<(), DeviceError> {
        self.send(&Request::FlashLed)
    }

    /// Start periodic `#MRAW` broadcasts
    pub fn start_broadcast(&mut self) -> Result<(), DeviceError> {
        self.send(&Request::Broadcast {
            interval_ms: self.broadcast_interval_ms,
        })
    }

    /// Queue a whole request, or nothing if it does not fit
    pub fn send(&mut self, request: &Request) -> Result<(), DeviceError> {
        let chunk = self.requests.transform(request)?;
        let free = self.channel.tx_free();
        if free < chunk.len() {
            return Err(DeviceError::TxFull {
                needed: chunk.len(),
                free,
            });
        }
        self.channel.write_bytes(&chunk);
        debug!(?request, "Request queued");
        Ok(())
    }

    /// Read bytes until a response is decoded or the channel runs dry
    pub fn receive(&mut self) -> Result<Option<Response>, DeviceError> {
        while let Some(byte) = self.channel.read_byte() {
            match self.responses.input(byte)? {
                ChunkStatus::Waiting => continue,
                ChunkStatus::InputOverwritten => {
                    warn!("Unread FDO2 response discarded");
                }
                ChunkStatus::OutputReady => {}
            }
            if let Some(parsed) = self.responses.output() {
                return Ok(Some(parsed?));
            }
        }
        Ok(None)
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }
}
