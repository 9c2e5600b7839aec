//! Deterministic fakes for tests (no hardware required)

use crate::clock::Clock;
use crate::transport::Transport;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Scripted transport: serves queued RX bytes and records transmitted ones
#[derive(Debug)]
pub struct MockTransport {
    rx: VecDeque<u8>,
    transmitted: Vec<u8>,
    accepting: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            transmitted: Vec::new(),
            accepting: true,
        }
    }

    /// Create a transport that will receive `bytes`
    pub fn with_rx(bytes: &[u8]) -> Self {
        let mut transport = Self::new();
        transport.push_rx(bytes);
        transport
    }

    /// Queue more bytes on the receive side
    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Bytes not yet picked up by the channel
    pub fn pending_rx(&self) -> usize {
        self.rx.len()
    }

    /// Everything transmitted so far
    pub fn transmitted(&self) -> &[u8] {
        &self.transmitted
    }

    /// Take and clear the transmitted bytes
    pub fn take_transmitted(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.transmitted)
    }

    /// Make the transport refuse (or accept again) transmissions
    pub fn set_accepting(&mut self, accepting: bool) {
        self.accepting = accepting;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn poll_receive(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn try_transmit(&mut self, byte: u8) -> bool {
        if self.accepting {
            self.transmitted.push(byte);
        }
        self.accepting
    }
}

/// Manually driven clock
///
/// With a non-zero auto step, every reading advances time afterwards, so polling loops
/// that wait on this clock always make progress.
#[derive(Debug, Default)]
pub struct MockClock {
    now_us: AtomicU64,
    auto_step_us: AtomicU64,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set absolute time in microseconds
    pub fn set_micros(&self, micros: u64) {
        self.now_us.store(micros, Ordering::SeqCst);
    }

    /// Set absolute time in milliseconds
    pub fn set_millis(&self, millis: u64) {
        self.set_micros(millis * 1_000);
    }

    pub fn advance_micros(&self, micros: u64) {
        self.now_us.fetch_add(micros, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance_micros(millis * 1_000);
    }

    /// Advance by `step` after every reading
    pub fn set_auto_step_micros(&self, step: u64) {
        self.auto_step_us.store(step, Ordering::SeqCst);
    }

    fn read(&self) -> u64 {
        let step = self.auto_step_us.load(Ordering::SeqCst);
        self.now_us.fetch_add(step, Ordering::SeqCst)
    }
}

impl Clock for MockClock {
    fn millis(&self) -> u32 {
        (self.read() / 1_000) as u32
    }

    fn micros(&self) -> u32 {
        self.read() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_manual() {
        let clock = MockClock::new();
        assert_eq!(clock.millis(), 0);
        clock.advance_millis(3);
        assert_eq!(clock.millis(), 3);
        assert_eq!(clock.micros(), 3_000);
        clock.set_micros(u32::MAX as u64 + 10);
        assert_eq!(clock.micros(), 9);
    }

    #[test]
    fn test_mock_clock_auto_step() {
        let clock = MockClock::new();
        clock.set_auto_step_micros(250);
        assert_eq!(clock.micros(), 0);
        assert_eq!(clock.micros(), 250);
        assert_eq!(clock.micros(), 500);
    }

    #[test]
    fn test_mock_transport_refuses() {
        let mut transport = MockTransport::with_rx(&[7]);
        transport.set_accepting(false);
        assert!(!transport.try_transmit(1));
        assert!(transport.transmitted().is_empty());
        assert_eq!(transport.poll_receive(), Some(7));
        assert_eq!(transport.poll_receive(), None);
    }
}
