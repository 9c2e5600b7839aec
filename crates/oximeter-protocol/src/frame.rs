//! Frame Decoding
//!
//! A frame is `[0x01, STATUS, PLETH, DATA, CHK]` where `CHK` is the sum of the first
//! four bytes modulo 256.

use crate::error::FramingError;
use crate::status;
use data_validator::{Checksum, Sum8, ValidationError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Frame width in bytes
pub const FRAME_LEN: usize = 5;

/// First byte of every frame
pub const START_BYTE: u8 = 0x01;

/// One validated 5-byte frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Build a well-formed frame, computing its checksum
    pub fn new(status: u8, pleth: u8, data: u8) -> Self {
        let mut bytes = [START_BYTE, status, pleth, data, 0];
        bytes[4] = Sum8.compute(&bytes[..4]);
        Self(bytes)
    }

    /// Wrap raw bytes without validating them
    pub const fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    pub fn status(&self) -> u8 {
        self.0[1]
    }

    pub fn pleth(&self) -> u8 {
        self.0[2]
    }

    pub fn data(&self) -> u8 {
        self.0[3]
    }

    pub fn checksum(&self) -> u8 {
        self.0[4]
    }

    /// Whether this frame starts a packet
    pub fn is_sync(&self) -> bool {
        self.status() & status::SYNC != 0
    }

    /// Check start byte, status bit 7 and checksum
    pub fn validate(&self) -> Result<(), FramingError> {
        if self.0[0] != START_BYTE {
            return Err(FramingError::StartByte(self.0[0]));
        }
        if self.status() & status::BIT7 == 0 {
            return Err(FramingError::StatusByte(self.status()));
        }
        match Sum8.verify(&self.0[..4], self.checksum()) {
            Err(ValidationError::Checksum { computed, received }) => Err(FramingError::Checksum {
                expected: computed,
                actual: received,
            }),
            _ => Ok(()),
        }
    }

    /// A valid frame that also carries the SYNC bit
    fn is_packet_start(&self) -> bool {
        self.validate().is_ok() && self.is_sync()
    }
}

/// Result of feeding one byte to the [`FrameDecoder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameStatus {
    /// More bytes are needed
    Waiting,
    /// A frame is ready to be taken with [`FrameDecoder::output`]
    Available,
}

/// Byte-at-a-time frame decoder
///
/// While unsynchronised it slides a 5-byte window over the stream until the window holds
/// a valid packet-start frame. From then on framing is positional: every following
/// 5 bytes form a frame, and a byte that merely looks like a frame start mid-frame is
/// not treated as one. Any invalid frame drops the buffered bytes and returns the decoder
/// to hunting.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    window: [u8; FRAME_LEN],
    len: usize,
    synced: bool,
    output: Option<Frame>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte
    pub fn input(&mut self, byte: u8) -> Result<FrameStatus, FramingError> {
        if self.synced {
            self.input_synced(byte)
        } else {
            Ok(self.input_hunting(byte))
        }
    }

    fn input_hunting(&mut self, byte: u8) -> FrameStatus {
        if self.len == FRAME_LEN {
            self.window.copy_within(1.., 0);
            self.len -= 1;
        }
        self.window[self.len] = byte;
        self.len += 1;

        if self.len < FRAME_LEN {
            return FrameStatus::Waiting;
        }

        let candidate = Frame(self.window);
        if !candidate.is_packet_start() {
            return FrameStatus::Waiting;
        }

        debug!("Frame decoder synchronised");
        self.synced = true;
        self.len = 0;
        self.output = Some(candidate);
        FrameStatus::Available
    }

    fn input_synced(&mut self, byte: u8) -> Result<FrameStatus, FramingError> {
        self.window[self.len] = byte;
        self.len += 1;
        if self.len < FRAME_LEN {
            return Ok(FrameStatus::Waiting);
        }

        self.len = 0;
        let frame = Frame(self.window);
        match frame.validate() {
            Ok(()) => {
                self.output = Some(frame);
                Ok(FrameStatus::Available)
            }
            Err(err) => {
                warn!(error = %err, "Discarding frame, resynchronising");
                self.reset();
                Err(err)
            }
        }
    }

    /// Take the most recently completed frame
    pub fn output(&mut self) -> Option<Frame> {
        self.output.take()
    }

    /// Whether the decoder has found frame alignment
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Drop all buffered state and return to sync hunting
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<Result<FrameStatus, FramingError>> {
        bytes.iter().map(|&b| decoder.input(b)).collect()
    }

    #[test]
    fn test_frame_new_computes_checksum() {
        let frame = Frame::new(0x81, 0x01, 0x00);
        assert_eq!(frame.as_bytes(), &[0x01, 0x81, 0x01, 0x00, 0x83]);
        assert!(frame.validate().is_ok());
        assert!(frame.is_sync());
        assert!(!Frame::new(0x80, 0x01, 0x48).is_sync());
    }

    #[test]
    fn test_frame_validation_errors() {
        assert_eq!(
            Frame::from_bytes([0x02, 0x81, 0x01, 0x00, 0x84]).validate(),
            Err(FramingError::StartByte(0x02))
        );
        assert_eq!(
            Frame::from_bytes([0x01, 0x01, 0x01, 0x00, 0x03]).validate(),
            Err(FramingError::StatusByte(0x01))
        );
        assert_eq!(
            Frame::from_bytes([0x01, 0x80, 0x01, 0x48, 0xCB]).validate(),
            Err(FramingError::Checksum {
                expected: 0xCA,
                actual: 0xCB
            })
        );
    }

    #[test]
    fn test_decode_sync_frame() {
        let mut decoder = FrameDecoder::new();
        let results = feed(&mut decoder, &[0x01, 0x81, 0x01, 0x00, 0x83]);
        assert!(results[..4].iter().all(|r| *r == Ok(FrameStatus::Waiting)));
        assert_eq!(results[4], Ok(FrameStatus::Available));
        assert_eq!(decoder.output(), Some(Frame::new(0x81, 0x01, 0x00)));
        assert_eq!(decoder.output(), None);
        assert!(decoder.is_synced());
    }

    #[test]
    fn test_hunting_skips_non_sync_frames() {
        let mut decoder = FrameDecoder::new();
        // A valid frame without the SYNC bit does not establish alignment
        let results = feed(&mut decoder, Frame::new(0x80, 0x10, 0x20).as_bytes());
        assert!(results.iter().all(|r| *r == Ok(FrameStatus::Waiting)));
        assert!(!decoder.is_synced());

        let results = feed(&mut decoder, Frame::new(0x81, 0x10, 0x20).as_bytes());
        assert_eq!(results[4], Ok(FrameStatus::Available));
    }

    #[test]
    fn test_hunting_slides_over_garbage() {
        let mut decoder = FrameDecoder::new();
        let mut stream = vec![0x55, 0xAA, 0x01, 0x81];
        stream.extend_from_slice(Frame::new(0x81, 0x42, 0x07).as_bytes());
        let results = feed(&mut decoder, &stream);
        assert!(results[..stream.len() - 1]
            .iter()
            .all(|r| *r == Ok(FrameStatus::Waiting)));
        assert_eq!(results[stream.len() - 1], Ok(FrameStatus::Available));
        assert_eq!(decoder.output().map(|f| f.pleth()), Some(0x42));
    }

    #[test]
    fn test_corrupted_checksum_resets() {
        let mut decoder = FrameDecoder::new();
        feed(&mut decoder, Frame::new(0x81, 0x01, 0x00).as_bytes());
        decoder.output();

        let results = feed(&mut decoder, &[0x01, 0x80, 0x01, 0x48, 0xCB]);
        assert_eq!(
            results[4],
            Err(FramingError::Checksum {
                expected: 0xCA,
                actual: 0xCB
            })
        );
        assert!(!decoder.is_synced());
        assert_eq!(decoder.output(), None);
    }

    #[test]
    fn test_positional_framing_ignores_mid_frame_start() {
        let mut decoder = FrameDecoder::new();
        feed(&mut decoder, Frame::new(0x81, 0x01, 0x00).as_bytes());
        decoder.output();

        // One byte lost: the next frame boundary is misaligned
        let mut stream = Frame::new(0x80, 0x01, 0x48).as_bytes()[1..].to_vec();
        stream.extend_from_slice(Frame::new(0x80, 0x02, 0x49).as_bytes());
        let results = feed(&mut decoder, &stream);

        // The 0x01 start byte arriving at position 4 is not a resync point
        assert_eq!(results[4], Err(FramingError::StartByte(0x80)));
        assert!(!decoder.is_synced());
    }

    #[test]
    fn test_status_byte_error_when_synced() {
        let mut decoder = FrameDecoder::new();
        feed(&mut decoder, Frame::new(0x81, 0x01, 0x00).as_bytes());
        let results = feed(&mut decoder, &[0x01, 0x00, 0x01, 0x00, 0x02]);
        assert_eq!(results[4], Err(FramingError::StatusByte(0x00)));
    }

    proptest! {
        #[test]
        fn prop_corrupt_checksum_then_resync(
            pleth in any::<u8>(),
            data in any::<u8>(),
            flip in 1u8..=255,
        ) {
            let mut decoder = FrameDecoder::new();
            feed(&mut decoder, Frame::new(0x81, 0x00, 0x00).as_bytes());
            prop_assert!(decoder.is_synced());

            let mut corrupted = *Frame::new(0x80, pleth, data).as_bytes();
            corrupted[4] ^= flip;
            let results = feed(&mut decoder, &corrupted);
            let is_checksum_error = matches!(results[4], Err(FramingError::Checksum { .. }));
            prop_assert!(is_checksum_error);

            let results = feed(&mut decoder, Frame::new(0x81, pleth, data).as_bytes());
            prop_assert_eq!(results[4], Ok(FrameStatus::Available));
            prop_assert_eq!(decoder.output(), Some(Frame::new(0x81, pleth, data)));
        }

        #[test]
        fn prop_garbage_then_sync_frame(
            garbage in proptest::collection::vec(any::<u8>().prop_filter("no start byte", |b| *b != START_BYTE), 0..64),
            pleth in any::<u8>(),
            data in any::<u8>(),
        ) {
            let mut decoder = FrameDecoder::new();
            for &byte in &garbage {
                prop_assert_eq!(decoder.input(byte), Ok(FrameStatus::Waiting));
            }
            let frame = Frame::new(0x81, pleth, data);
            let results = feed(&mut decoder, frame.as_bytes());
            prop_assert_eq!(results[4], Ok(FrameStatus::Available));
            prop_assert_eq!(decoder.output(), Some(frame));
        }
    }
}
