//! Monotonic time sources

use std::time::Instant;

/// Monotonic millisecond and microsecond counters
///
/// Both counters wrap around; consumers compare timestamps with wrapping subtraction.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch
    fn millis(&self) -> u32;

    /// Microseconds since an arbitrary epoch
    fn micros(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn millis(&self) -> u32 {
        (**self).millis()
    }

    fn micros(&self) -> u32 {
        (**self).micros()
    }
}

/// Whether less than `timeout` has passed between `start` and `now`
///
/// Wrapping subtraction keeps this correct across one counter wraparound.
pub fn within_timeout(start: u32, timeout: u32, now: u32) -> bool {
    now.wrapping_sub(start) < timeout
}

/// Clock backed by [`Instant`], counting from its creation
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> u32 {
        // Truncation is the wraparound
        self.start.elapsed().as_millis() as u32
    }

    fn micros(&self) -> u32 {
        self.start.elapsed().as_micros() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.micros();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = clock.micros();
        assert!(second.wrapping_sub(first) >= 2_000);
        assert!(clock.millis() >= 2);
    }

    #[test]
    fn test_within_timeout() {
        assert!(within_timeout(100, 50, 100));
        assert!(within_timeout(100, 50, 149));
        assert!(!within_timeout(100, 50, 150));
        // Counter wrapped between start and now
        assert!(within_timeout(u32::MAX - 10, 50, 20));
        assert!(!within_timeout(u32::MAX - 10, 50, 40));
    }
}
