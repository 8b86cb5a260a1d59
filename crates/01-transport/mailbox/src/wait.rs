//! Polling helpers used on both sides of the mailbox.
//!
//! Workers have no way to notify the host, and the host never signals
//! workers, so all waiting is bounded polling: the host polls a ticket until a
//! deadline, and idle workers back off between empty peeks.

use std::thread;
use std::time::{Duration, Instant};

/// Result of a bounded poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The probe produced a value before the deadline.
    Ready(T),
    /// The deadline passed without the probe producing a value.
    TimedOut,
}

/// Calls `probe` every `interval` until it returns `Some` or `deadline` passes.
///
/// The probe always runs at least once. `TimedOut` is only reported once
/// `Instant::now() >= deadline`, so callers never return early.
pub fn poll_until<T>(
    deadline: Instant,
    interval: Duration,
    mut probe: impl FnMut() -> Option<T>,
) -> PollOutcome<T> {
    loop {
        if let Some(value) = probe() {
            return PollOutcome::Ready(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return PollOutcome::TimedOut;
        }
        thread::sleep(interval.min(deadline - now));
    }
}

/// Escalating idle strategy for worker loops: spin, then yield, then sleep.
#[derive(Clone, Debug)]
pub struct IdleBackoff {
    step: u32,
    max_sleep: Duration,
}

const SPIN_STEPS: u32 = 6;
const YIELD_STEPS: u32 = 10;

impl IdleBackoff {
    pub fn new(max_sleep: Duration) -> Self {
        Self { step: 0, max_sleep }
    }

    /// Forget accumulated idleness after useful work.
    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Waits a little longer than the previous call did.
    pub fn snooze(&mut self) {
        if self.step < SPIN_STEPS {
            for _ in 0..(1u32 << self.step) {
                std::hint::spin_loop();
            }
        } else if self.step < YIELD_STEPS {
            thread::yield_now();
        } else {
            thread::sleep(self.max_sleep);
        }
        self.step = self.step.saturating_add(1);
    }

    pub fn is_sleeping(&self) -> bool {
        self.step >= YIELD_STEPS
    }
}
