//! Chunk Framing
//!
//! Chunks are byte strings terminated by [`DELIMITER`]. The decoder keeps the delimiter
//! as the last byte of each chunk and the encoder appends it.

use crate::error::ChunkError;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// End-of-chunk delimiter
pub const DELIMITER: u8 = b'\r';

/// Result of feeding one byte to the [`ChunkDecoder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStatus {
    /// Accumulating a chunk
    Waiting,
    /// A complete chunk is ready to be taken with [`ChunkDecoder::output`]
    OutputReady,
    /// Earlier data was discarded: either a complete chunk that was never taken, or a
    /// partial chunk cut off by a new start marker. When the same byte also completes a
    /// new chunk, [`ChunkStatus::OutputReady`] is reported instead and the loss only shows
    /// in [`ChunkDecoder::overwrite_count`].
    InputOverwritten,
}

/// Byte-at-a-time chunk decoder with a capacity of `N` bytes including the delimiter
///
/// A chunk longer than `N` is rejected: every byte up to and including its delimiter
/// reports [`ChunkError::InvalidLength`], then decoding starts afresh. With a start
/// marker, bytes before the marker are skipped and a marker arriving mid-chunk restarts
/// the chunk.
#[derive(Debug)]
pub struct ChunkDecoder<const N: usize> {
    buffer: Vec<u8, N>,
    start_marker: Option<u8>,
    complete: bool,
    unread: bool,
    overflowed: bool,
    overwrites: u32,
}

impl<const N: usize> ChunkDecoder<N> {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            start_marker: None,
            complete: false,
            unread: false,
            overflowed: false,
            overwrites: 0,
        }
    }

    /// Decoder that only starts a chunk at `marker` and restarts on it
    pub const fn with_start_marker(marker: u8) -> Self {
        let mut decoder = Self::new();
        decoder.start_marker = Some(marker);
        decoder
    }

    /// Feed one byte
    pub fn input(&mut self, byte: u8) -> Result<ChunkStatus, ChunkError> {
        let mut overwritten = false;

        if self.complete {
            overwritten = self.unread;
            self.buffer.clear();
            self.complete = false;
            self.unread = false;
        }

        if self.start_marker == Some(byte) {
            if !self.buffer.is_empty() {
                warn!(
                    discarded = self.buffer.len(),
                    "Start marker inside chunk, discarding partial chunk"
                );
                overwritten = true;
            }
            self.buffer.clear();
            self.overflowed = false;
        } else if self.overflowed {
            if byte == DELIMITER {
                self.overflowed = false;
            }
            return Err(ChunkError::InvalidLength { max: N });
        } else if self.buffer.is_empty() && self.start_marker.is_some() {
            // Skipping noise until a start marker
            return Ok(self.status(overwritten, ChunkStatus::Waiting));
        }

        if self.buffer.push(byte).is_err() {
            warn!(max = N, "Chunk exceeds buffer, dropping it");
            self.buffer.clear();
            self.overflowed = byte != DELIMITER;
            return Err(ChunkError::InvalidLength { max: N });
        }

        if byte == DELIMITER {
            self.complete = true;
            self.unread = true;
            return Ok(self.status(overwritten, ChunkStatus::OutputReady));
        }

        Ok(self.status(overwritten, ChunkStatus::Waiting))
    }

    fn status(&mut self, overwritten: bool, status: ChunkStatus) -> ChunkStatus {
        if !overwritten {
            return status;
        }
        self.overwrites = self.overwrites.saturating_add(1);
        warn!(overwrites = self.overwrites, "Chunk input overwritten");
        match status {
            ChunkStatus::OutputReady => ChunkStatus::OutputReady,
            _ => ChunkStatus::InputOverwritten,
        }
    }

    /// Take the completed chunk, delimiter included
    pub fn output(&mut self) -> Option<&[u8]> {
        if !self.unread {
            return None;
        }
        self.unread = false;
        Some(&self.buffer)
    }

    /// Whether a completed chunk is waiting to be taken
    pub fn is_ready(&self) -> bool {
        self.unread
    }

    /// Chunks or partial chunks discarded so far
    pub fn overwrite_count(&self) -> u32 {
        self.overwrites
    }

    /// Drop all buffered state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.complete = false;
        self.unread = false;
        self.overflowed = false;
    }
}

impl<const N: usize> Default for ChunkDecoder<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Chunk encoder with a capacity of `N` bytes including the delimiter
#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkEncoder<const N: usize>;

impl<const N: usize> ChunkEncoder<N> {
    pub const fn new() -> Self {
        Self
    }

    /// Append the delimiter to `payload`
    pub fn encode(&self, payload: &mut Vec<u8, N>) -> Result<(), ChunkError> {
        payload
            .push(DELIMITER)
            .map_err(|_| ChunkError::InvalidLength { max: N })
    }

    /// Copy `payload` into a new chunk
    pub fn encode_slice(&self, payload: &[u8]) -> Result<Vec<u8, N>, ChunkError> {
        let mut chunk = Vec::new();
        chunk
            .extend_from_slice(payload)
            .map_err(|_| ChunkError::InvalidLength { max: N })?;
        self.encode(&mut chunk)?;
        Ok(chunk)
    }
}
