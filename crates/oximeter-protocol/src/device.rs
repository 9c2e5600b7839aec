//! Nonin Device
//!
//! Runs received bytes through the frame and packet decoders.

use crate::error::FramingError;
use crate::frame::{FrameDecoder, FrameStatus};
use crate::measurements::{NoninPacketDecoder, PacketMeasurements};
use crate::packet::PacketStatus;
use serial_channel::ByteChannel;

/// Pulse oximeter attached to a serial channel
pub struct Device<C> {
    channel: C,
    frames: FrameDecoder,
    packets: NoninPacketDecoder,
}

impl<C: ByteChannel> Device<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            frames: FrameDecoder::new(),
            packets: NoninPacketDecoder::new(),
        }
    }

    /// Consume at most one received byte
    ///
    /// Returns [`PacketStatus::Waiting`] when no byte is buffered.
    pub fn output(&mut self) -> Result<PacketStatus, FramingError> {
        let Some(byte) = self.channel.read_byte() else {
            return Ok(PacketStatus::Waiting);
        };

        match self.frames.input(byte)? {
            FrameStatus::Waiting => Ok(PacketStatus::Waiting),
            FrameStatus::Available => match self.frames.output() {
                Some(frame) => Ok(self.packets.input(frame)),
                None => Ok(PacketStatus::Waiting),
            },
        }
    }

    /// Measurements of the last complete packet, until the next frame arrives
    pub fn measurements(&self) -> Option<PacketMeasurements> {
        self.packets
            .output()
            .map(|packet| PacketMeasurements::from_packet(&packet))
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }
}
