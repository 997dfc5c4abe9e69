//! Time source and cooperative suspension points.
//!
//! Every place the pipeline gives up the CPU goes through a [`Clock`], so the
//! scheduling model stays visible and tests can drive time by hand.

use std::time::{Duration, Instant};

/// Monotonic time plus the two kinds of suspension the loop uses.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    /// Block the caller for `duration`.
    fn sleep(&self, duration: Duration);

    /// Let timer/radio housekeeping run without a fixed pause.
    fn yield_now(&self) {
        self.sleep(Duration::ZERO);
    }
}

/// [`Clock`] backed by `std::time` and `std::thread`.
///
/// Works unchanged on Linux and ESP-IDF (where threads are FreeRTOS tasks).
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn yield_now(&self) {
        std::thread::yield_now();
    }
}
