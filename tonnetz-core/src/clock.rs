//! Monotonic time source for the scheduling loops.
//!
//! The arpeggiator never sleeps a fixed duration per note; it waits for
//! absolute deadlines through a `Clock`, so tests can substitute virtual time.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Below this remaining wait the real clock yields instead of sleeping,
/// since OS sleeps routinely overshoot by about a millisecond.
const SPIN_MARGIN: Duration = Duration::from_millis(1);

pub trait Clock: Send + 'static {
    fn now(&self) -> Instant;

    /// Give up the CPU while `remaining` time is left before a deadline.
    /// May return early; callers re-check `now()`.
    fn pause(&self, remaining: Duration);
}

/// Real monotonic clock: coarse sleep, then yield until the deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn pause(&self, remaining: Duration) {
        if remaining > SPIN_MARGIN {
            thread::sleep(remaining - SPIN_MARGIN);
        } else {
            thread::yield_now();
        }
    }
}

/// Virtual clock for simulation and tests.
///
/// `pause` advances time by the requested amount plus a fixed oversleep,
/// modelling a scheduler that always wakes a little late.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
    oversleep: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::with_oversleep(Duration::ZERO)
    }

    pub fn with_oversleep(oversleep: Duration) -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
            oversleep,
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn pause(&self, remaining: Duration) {
        self.advance(remaining + self.oversleep);
    }
}
