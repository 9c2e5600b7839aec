//! Lock-Free Ring Buffer
//!
//! Provides a fixed-capacity SPSC byte queue for the UART receive and transmit paths.
//! One side may run in interrupt context while the other runs in the foreground loop.

mod buffer;

pub use buffer::{Consumer, Producer, RingBuffer};

use thiserror::Error;

/// Ring buffer access errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("Ring buffer is full")]
    Full,

    #[error("Ring buffer is empty")]
    Empty,
}
