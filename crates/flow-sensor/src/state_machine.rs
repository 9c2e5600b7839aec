//! Sensor step sequencing
//!
//! Pure timing logic: the machine decides which step comes next from the current time
//! only. Whether a step succeeded is the [`crate::Sensor`]'s business, which simply does
//! not advance the machine when a step has to be repeated.

use serde::{Deserialize, Serialize};
use serial_channel::within_timeout;

/// Next step for the sensor to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Initialize,
    WaitWarmup,
    CheckRange,
    Measure,
    WaitMeasurement,
}

/// Moore machine over the sensor steps
#[derive(Debug, Clone)]
pub struct StateMachine {
    next_action: Action,
    wait_start_us: u32,
    warmup_us: u32,
    measure_interval_us: u32,
}

impl StateMachine {
    pub fn new(warmup_us: u32, measure_interval_us: u32) -> Self {
        Self {
            next_action: Action::Initialize,
            wait_start_us: 0,
            warmup_us,
            measure_interval_us,
        }
    }

    /// Advance past the current step
    pub fn update(&mut self, now_us: u32) -> Action {
        self.next_action = match self.next_action {
            Action::Initialize => {
                self.wait_start_us = now_us;
                Action::WaitWarmup
            }
            Action::WaitWarmup if self.finished_waiting(self.warmup_us, now_us) => {
                Action::CheckRange
            }
            Action::CheckRange | Action::Measure => {
                self.wait_start_us = now_us;
                Action::WaitMeasurement
            }
            Action::WaitMeasurement if self.finished_waiting(self.measure_interval_us, now_us) => {
                Action::Measure
            }
            waiting => waiting,
        };
        self.next_action
    }

    fn finished_waiting(&self, duration_us: u32, now_us: u32) -> bool {
        !within_timeout(self.wait_start_us, duration_us, now_us)
    }

    pub fn next_action(&self) -> Action {
        self.next_action
    }

    /// Wait out a full warm-up again from `now_us`, e.g. after measurement was restarted
    pub fn restart_warmup(&mut self, now_us: u32) -> Action {
        self.wait_start_us = now_us;
        self.next_action = Action::WaitWarmup;
        self.next_action
    }

    /// Back to [`Action::Initialize`]
    pub fn reset(&mut self) {
        self.next_action = Action::Initialize;
        self.wait_start_us = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_warmup_then_check_range() {
        let mut fsm = StateMachine::new(30_000, 500);
        assert_eq!(fsm.update(1_000), Action::WaitWarmup);
        assert_eq!(fsm.update(30_999), Action::WaitWarmup);
        assert_eq!(fsm.update(31_000), Action::CheckRange);
    }

    #[test]
    fn test_measure_cycle() {
        let mut fsm = StateMachine::new(30_000, 500);
        fsm.update(0);
        fsm.update(30_000);
        assert_eq!(fsm.update(30_010), Action::WaitMeasurement);
        assert_eq!(fsm.update(30_509), Action::WaitMeasurement);
        assert_eq!(fsm.update(30_510), Action::Measure);
        assert_eq!(fsm.update(30_600), Action::WaitMeasurement);
        assert_eq!(fsm.update(31_100), Action::Measure);
    }

    #[test]
    fn test_restart_warmup() {
        let mut fsm = StateMachine::new(30_000, 500);
        fsm.update(0);
        fsm.update(30_000);
        assert_eq!(fsm.restart_warmup(31_000), Action::WaitWarmup);
        assert_eq!(fsm.update(60_999), Action::WaitWarmup);
        assert_eq!(fsm.update(61_000), Action::CheckRange);
    }

    #[test]
    fn test_reset() {
        let mut fsm = StateMachine::new(30_000, 500);
        fsm.update(0);
        fsm.reset();
        assert_eq!(fsm.next_action(), Action::Initialize);
    }

    proptest! {
        #[test]
        fn prop_warmup_tolerates_wraparound(start in any::<u32>(), elapsed in 0u32..60_000) {
            let mut fsm = StateMachine::new(30_000, 500);
            fsm.update(start);
            let action = fsm.update(start.wrapping_add(elapsed));
            if elapsed >= 30_000 {
                prop_assert_eq!(action, Action::CheckRange);
            } else {
                prop_assert_eq!(action, Action::WaitWarmup);
            }
        }
    }
}
