//! Packet Assembly
//!
//! A packet is `SLOTS` consecutive frames, the first of which carries the SYNC bit.

use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Result of feeding one frame to the [`PacketDecoder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketStatus {
    /// More frames are needed
    Waiting,
    /// A complete packet is ready
    Available,
    /// One or more frames were lost; the partial packet was discarded
    MissedData,
}

/// A complete set of frames, one per slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<const SLOTS: usize> {
    frames: [Frame; SLOTS],
}

impl<const SLOTS: usize> Packet<SLOTS> {
    /// Frame at `slot`
    pub fn frame(&self, slot: usize) -> &Frame {
        &self.frames[slot]
    }

    pub fn frames(&self) -> &[Frame; SLOTS] {
        &self.frames
    }

    /// DATA byte of the frame at `slot`
    pub fn read_u8(&self, slot: usize) -> u8 {
        self.frames[slot].data()
    }

    /// Big-endian 16-bit value from the DATA bytes of two frames
    pub fn read_u16(&self, msb_slot: usize, lsb_slot: usize) -> u16 {
        u16::from_be_bytes([self.read_u8(msb_slot), self.read_u8(lsb_slot)])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No SYNC frame seen yet
    Hunting,
    /// Filling slots after a SYNC frame
    Collecting,
    /// All slots filled, packet readable
    Complete,
    /// Frames lost after a complete packet, dropping until the next SYNC frame
    Discarding,
}

/// Frame-at-a-time packet assembler
///
/// The expected slot of a frame is its distance from the last SYNC frame. Loss is
/// detected when a SYNC frame arrives before every slot is filled, and when a non-SYNC
/// frame arrives after a complete packet. In both cases the partial packet is dropped
/// and [`PacketStatus::MissedData`] is reported once.
#[derive(Debug)]
pub struct PacketDecoder<const SLOTS: usize> {
    frames: [Frame; SLOTS],
    received: usize,
    state: State,
}

impl<const SLOTS: usize> PacketDecoder<SLOTS> {
    const HAS_SLOTS: () = assert!(SLOTS > 0, "a packet needs at least one frame slot");

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::HAS_SLOTS;
        Self {
            frames: [Frame::default(); SLOTS],
            received: 0,
            state: State::Hunting,
        }
    }

    /// Feed one validated frame
    pub fn input(&mut self, frame: Frame) -> PacketStatus {
        if frame.is_sync() {
            let lost = self.state == State::Collecting;
            if lost {
                warn!(
                    received = self.received,
                    expected = SLOTS,
                    "SYNC frame before packet completed, discarding partial packet"
                );
            }
            self.frames[0] = frame;
            self.received = 1;
            self.state = State::Collecting;
            return match (self.complete_if_full(), lost) {
                (_, true) => PacketStatus::MissedData,
                (true, false) => PacketStatus::Available,
                (false, false) => PacketStatus::Waiting,
            };
        }

        match self.state {
            State::Hunting | State::Discarding => PacketStatus::Waiting,
            State::Complete => {
                warn!("Frame without SYNC after complete packet, waiting for next packet");
                self.state = State::Discarding;
                PacketStatus::MissedData
            }
            State::Collecting => {
                self.frames[self.received] = frame;
                self.received += 1;
                if self.complete_if_full() {
                    PacketStatus::Available
                } else {
                    PacketStatus::Waiting
                }
            }
        }
    }

    fn complete_if_full(&mut self) -> bool {
        if self.received < SLOTS {
            return false;
        }
        debug!(frames = SLOTS, "Packet complete");
        self.state = State::Complete;
        true
    }

    /// The last complete packet, until the next frame arrives
    pub fn output(&self) -> Option<Packet<SLOTS>> {
        (self.state == State::Complete).then_some(Packet {
            frames: self.frames,
        })
    }

    /// Frames collected towards the current packet
    pub fn received(&self) -> usize {
        self.received
    }

    /// Forget any partial packet and wait for the next SYNC frame
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl<const SLOTS: usize> Default for PacketDecoder<SLOTS> {
    fn default() -> Self {
        Self::new()
    }
}
