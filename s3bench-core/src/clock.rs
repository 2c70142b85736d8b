//! Time source used to measure batch latency.

use std::fmt::Debug;
use std::time::Instant;

/// A monotonic timer reporting milliseconds since an arbitrary origin.
///
/// Only differences between two readings are meaningful.
pub trait Clock: Debug + Send + Sync + 'static {
    fn now_ms(&self) -> f64;
}

/// [`Clock`] backed by [`std::time::Instant`].
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}
