//! Nonin Protocol Error Types

use thiserror::Error;

/// A frame failed validation after the decoder was synchronised
///
/// The decoder has already discarded its buffered bytes and returned to sync hunting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FramingError {
    /// First byte of the frame was not 0x01
    #[error("Invalid start byte: {0:02X}")]
    StartByte(u8),

    /// Status byte did not have bit 7 set
    #[error("Invalid status byte: {0:02X}")]
    StatusByte(u8),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:02X}, got {actual:02X}")]
    Checksum { expected: u8, actual: u8 },
}
