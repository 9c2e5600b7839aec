//! Buffered UART channel

use crate::clock::Clock;
use crate::transport::{ByteChannel, Transport};
use ring_buffer::{BufferError, Consumer, Producer, RingBuffer};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Timeout for blocking writes (ms)
    pub write_timeout_ms: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: 10,
        }
    }
}

/// Outcome of a multi-byte write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteStatus {
    /// Every byte was queued
    Ok,
    /// Only a prefix was queued; the caller resumes with the remainder
    Partial,
}

/// Saturating count of received bytes lost to a full RX buffer
#[derive(Debug, Default)]
pub struct DroppedCounter {
    count: AtomicU32,
}

impl DroppedCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// Increment, sticking at `u32::MAX`
    pub fn increment(&self) {
        let _ = self
            .count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                count.checked_add(1)
            });
    }

    /// Current total
    pub fn get(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Bytes dropped since an earlier reading of [`DroppedCounter::get`]
    pub fn delta_since(&self, previous: u32) -> u32 {
        self.get().saturating_sub(previous)
    }
}

/// Storage for one channel: RX and TX ring buffers plus the RX drop counter
///
/// Allocated once and split into the foreground and interrupt halves.
pub struct ChannelBuffers<const RX: usize, const TX: usize> {
    rx: RingBuffer<RX>,
    tx: RingBuffer<TX>,
    dropped: DroppedCounter,
}

impl<const RX: usize, const TX: usize> ChannelBuffers<RX, TX> {
    pub const fn new() -> Self {
        Self {
            rx: RingBuffer::new(),
            tx: RingBuffer::new(),
            dropped: DroppedCounter::new(),
        }
    }

    /// Split into the foreground channel and the interrupt-side service owning `transport`
    pub fn split<T: Transport>(
        &mut self,
        transport: T,
        config: ChannelConfig,
    ) -> (BufferedChannel<'_, RX, TX>, ChannelService<'_, T, RX, TX>) {
        let (rx_producer, rx_consumer) = self.rx.split();
        let (tx_producer, tx_consumer) = self.tx.split();
        let dropped = &self.dropped;

        debug!(
            rx_capacity = RX,
            tx_capacity = TX,
            "Splitting buffered channel"
        );

        (
            BufferedChannel {
                rx: rx_consumer,
                tx: tx_producer,
                dropped,
                config,
            },
            ChannelService {
                transport,
                rx: rx_producer,
                tx: tx_consumer,
                dropped,
            },
        )
    }
}

impl<const RX: usize, const TX: usize> Default for ChannelBuffers<RX, TX> {
    fn default() -> Self {
        Self::new()
    }
}

/// Foreground half of a buffered channel
pub struct BufferedChannel<'a, const RX: usize, const TX: usize> {
    rx: Consumer<'a, RX>,
    tx: Producer<'a, TX>,
    dropped: &'a DroppedCounter,
    config: ChannelConfig,
}

impl<'a, const RX: usize, const TX: usize> BufferedChannel<'a, RX, TX> {
    /// Take the next received byte, if any
    pub fn try_read_byte(&mut self) -> Option<u8> {
        self.rx.read().ok()
    }

    /// Number of received bytes waiting to be read
    pub fn available(&self) -> usize {
        self.rx.len()
    }

    /// Free space in the TX buffer
    pub fn tx_free(&self) -> usize {
        self.tx.capacity() - self.tx.len()
    }

    /// Queue one byte for transmission
    pub fn try_write_byte(&mut self, byte: u8) -> Result<(), BufferError> {
        self.tx.write(byte)
    }

    /// Queue as many bytes of `buf` as fit, returning how many were queued
    pub fn try_write_bytes(&mut self, buf: &[u8]) -> (WriteStatus, usize) {
        let mut written = 0;
        for &byte in buf {
            if self.tx.write(byte).is_err() {
                return (WriteStatus::Partial, written);
            }
            written += 1;
        }
        (WriteStatus::Ok, written)
    }

    /// Queue one byte, retrying until it fits or `timeout_ms` elapses
    pub fn write_byte_blocking<C: Clock>(
        &mut self,
        byte: u8,
        timeout_ms: u32,
        clock: &C,
    ) -> Result<(), BufferError> {
        let start = clock.millis();
        loop {
            match self.tx.write(byte) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if clock.millis().wrapping_sub(start) >= timeout_ms {
                        return Err(err);
                    }
                }
            }
            std::hint::spin_loop();
        }
    }

    /// Queue `buf`, retrying until every byte fits or `timeout_ms` elapses
    pub fn write_bytes_blocking<C: Clock>(
        &mut self,
        buf: &[u8],
        timeout_ms: u32,
        clock: &C,
    ) -> (WriteStatus, usize) {
        let start = clock.millis();
        let mut written = 0;
        while written < buf.len() {
            let (status, count) = self.try_write_bytes(&buf[written..]);
            written += count;
            if status == WriteStatus::Ok {
                break;
            }
            if clock.millis().wrapping_sub(start) >= timeout_ms {
                warn!(
                    written,
                    total = buf.len(),
                    timeout_ms,
                    "TX buffer still full after timeout"
                );
                return (WriteStatus::Partial, written);
            }
            std::hint::spin_loop();
        }
        (WriteStatus::Ok, written)
    }

    /// Queue `buf` with the configured write timeout
    pub fn write_bytes_timeout<C: Clock>(&mut self, buf: &[u8], clock: &C) -> (WriteStatus, usize) {
        let timeout_ms = self.config.write_timeout_ms;
        self.write_bytes_blocking(buf, timeout_ms, clock)
    }

    /// Total received bytes dropped because the RX buffer was full
    pub fn dropped_count(&self) -> u32 {
        self.dropped.get()
    }

    /// Received bytes dropped since an earlier [`BufferedChannel::dropped_count`]
    pub fn dropped_since(&self, previous: u32) -> u32 {
        self.dropped.delta_since(previous)
    }

    /// Channel configuration
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

impl<'a, const RX: usize, const TX: usize> ByteChannel for BufferedChannel<'a, RX, TX> {
    fn read_byte(&mut self) -> Option<u8> {
        self.try_read_byte()
    }

    fn write_bytes(&mut self, buf: &[u8]) -> (WriteStatus, usize) {
        self.try_write_bytes(buf)
    }

    fn tx_free(&self) -> usize {
        BufferedChannel::tx_free(self)
    }
}

/// Interrupt half of a buffered channel
pub struct ChannelService<'a, T, const RX: usize, const TX: usize> {
    transport: T,
    rx: Producer<'a, RX>,
    tx: Consumer<'a, TX>,
    dropped: &'a DroppedCounter,
}

impl<'a, T: Transport, const RX: usize, const TX: usize> ChannelService<'a, T, RX, TX> {
    /// Move every received byte from the transport into the RX buffer
    ///
    /// Bytes that do not fit are dropped and counted. Returns the number of bytes buffered.
    pub fn service_rx(&mut self) -> usize {
        let mut buffered = 0;
        while let Some(byte) = self.transport.poll_receive() {
            match self.rx.write(byte) {
                Ok(()) => buffered += 1,
                Err(_) => self.dropped.increment(),
            }
        }
        buffered
    }

    /// Move queued TX bytes into the transport until it refuses one
    ///
    /// Returns the number of bytes handed to the transport.
    pub fn service_tx(&mut self) -> usize {
        let mut sent = 0;
        while let Ok(byte) = self.tx.peek() {
            if !self.transport.try_transmit(byte) {
                break;
            }
            let _ = self.tx.read();
            sent += 1;
        }
        sent
    }

    /// One full interrupt pass: receive then transmit
    pub fn service(&mut self) -> (usize, usize) {
        (self.service_rx(), self.service_tx())
    }

    /// Whether bytes are still queued for transmission
    pub fn tx_pending(&self) -> bool {
        !self.tx.is_empty()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockClock, MockTransport};

    #[test]
    fn test_receive_path() {
        let mut buffers = ChannelBuffers::<8, 8>::new();
        let transport = MockTransport::with_rx(&[0x01, 0x02, 0x03]);
        let (mut channel, mut service) = buffers.split(transport, ChannelConfig::default());

        assert_eq!(channel.try_read_byte(), None);
        assert_eq!(service.service_rx(), 3);
        assert_eq!(channel.available(), 3);
        assert_eq!(channel.try_read_byte(), Some(0x01));
        assert_eq!(channel.try_read_byte(), Some(0x02));
        assert_eq!(channel.try_read_byte(), Some(0x03));
        assert_eq!(channel.try_read_byte(), None);
    }

    #[test]
    fn test_rx_overflow_drops_newest() {
        let mut buffers = ChannelBuffers::<4, 4>::new();
        let transport = MockTransport::with_rx(&[1, 2, 3, 4, 5, 6]);
        let (mut channel, mut service) = buffers.split(transport, ChannelConfig::default());

        let before = channel.dropped_count();
        assert_eq!(service.service_rx(), 4);
        assert_eq!(channel.dropped_count(), 2);
        assert_eq!(channel.dropped_since(before), 2);

        let received: Vec<u8> = std::iter::from_fn(|| channel.try_read_byte()).collect();
        assert_eq!(received, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_dropped_counter_saturates() {
        let counter = DroppedCounter::new();
        counter.count.store(u32::MAX - 1, Ordering::Relaxed);
        counter.increment();
        counter.increment();
        counter.increment();
        assert_eq!(counter.get(), u32::MAX);
        assert_eq!(counter.delta_since(u32::MAX - 1), 1);
    }

    #[test]
    fn test_partial_write() {
        let mut buffers = ChannelBuffers::<8, 4>::new();
        let (mut channel, mut service) =
            buffers.split(MockTransport::new(), ChannelConfig::default());

        let payload = b"#VERS\r";
        let (status, written) = channel.try_write_bytes(payload);
        assert_eq!(status, WriteStatus::Partial);
        assert_eq!(written, 4);
        assert_eq!(channel.try_write_byte(b'!'), Err(BufferError::Full));
        assert_eq!(channel.tx_free(), 0);

        assert_eq!(service.service_tx(), 4);
        assert!(!service.tx_pending());
        let (status, written) = channel.try_write_bytes(&payload[written..]);
        assert_eq!(status, WriteStatus::Ok);
        assert_eq!(written, 2);
        service.service_tx();
        assert_eq!(service.transport().transmitted(), payload);
    }

    #[test]
    fn test_tx_waits_for_transport() {
        let mut buffers = ChannelBuffers::<8, 8>::new();
        let mut transport = MockTransport::new();
        transport.set_accepting(false);
        let (mut channel, mut service) = buffers.split(transport, ChannelConfig::default());

        channel.try_write_bytes(&[0xAA, 0xBB]);
        assert_eq!(service.service_tx(), 0);
        assert!(service.tx_pending());

        service.transport_mut().set_accepting(true);
        assert_eq!(service.service(), (0, 2));
        assert_eq!(service.transport().transmitted(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_blocking_write_times_out() {
        let mut buffers = ChannelBuffers::<8, 2>::new();
        let (mut channel, _service) =
            buffers.split(MockTransport::new(), ChannelConfig::default());
        let clock = MockClock::new();
        clock.set_auto_step_micros(1_000);

        let (status, written) = channel.write_bytes_blocking(&[1, 2, 3, 4], 5, &clock);
        assert_eq!(status, WriteStatus::Partial);
        assert_eq!(written, 2);
        assert!(clock.millis() >= 5);

        assert_eq!(
            channel.write_byte_blocking(9, 3, &clock),
            Err(BufferError::Full)
        );
    }

    #[test]
    fn test_blocking_write_succeeds_with_room() {
        let mut buffers = ChannelBuffers::<8, 8>::new();
        let (mut channel, mut service) =
            buffers.split(MockTransport::new(), ChannelConfig::default());
        let clock = MockClock::new();

        assert_eq!(channel.write_byte_blocking(0x23, 10, &clock), Ok(()));
        assert_eq!(channel.write_bytes_timeout(b"LOGO\r", &clock), (WriteStatus::Ok, 5));
        service.service_tx();
        assert_eq!(service.transport().transmitted(), b"#LOGO\r");
    }

    #[test]
    fn test_blocking_write_drained_by_service_thread() {
        let mut buffers = ChannelBuffers::<8, 4>::new();
        let (mut channel, mut service) =
            buffers.split(MockTransport::new(), ChannelConfig::default());
        let clock = crate::SystemClock::new();
        let payload: Vec<u8> = (0..64).collect();

        std::thread::scope(|scope| {
            let handle = scope.spawn(move || {
                let mut sent = 0;
                while sent < 64 {
                    sent += service.service_tx();
                    std::thread::yield_now();
                }
                service
            });

            let (status, written) = channel.write_bytes_blocking(&payload, 5_000, &clock);
            assert_eq!(status, WriteStatus::Ok);
            assert_eq!(written, 64);

            let service = handle.join().unwrap();
            assert_eq!(service.transport().transmitted(), payload.as_slice());
        });
    }
}
