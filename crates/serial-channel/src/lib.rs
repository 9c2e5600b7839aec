//! Buffered Serial Channel
//!
//! Pairs an RX and a TX ring buffer with a raw byte transport. The interrupt side
//! ([`ChannelService`]) moves bytes between the transport and the buffers; the
//! foreground side ([`BufferedChannel`]) reads and writes the buffers without blocking,
//! or with a bounded timeout.

mod channel;
mod clock;
pub mod mock;
mod transport;

pub use channel::{
    BufferedChannel, ChannelBuffers, ChannelConfig, ChannelService, DroppedCounter, WriteStatus,
};
pub use clock::{within_timeout, Clock, SystemClock};
pub use ring_buffer::BufferError;
pub use transport::{ByteChannel, Transport};
