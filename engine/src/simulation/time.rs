//! Simulated time source for deterministic testing.

use std::cell::Cell;

use chrono::{DateTime, Utc};

use crate::time::TimeSource;

/// A clock that only moves when told to.
///
/// Uses [`Cell`] for interior mutability, so it is single-threaded only.
/// Simulations run on one thread anyway.
///
/// # Example
///
/// ```
/// use record_engine::simulation::SimulatedTimeSource;
/// use record_engine::time::TimeSource;
///
/// let time = SimulatedTimeSource::new(1_000);
/// time.advance(500);
/// assert_eq!(time.now().timestamp_millis(), 1_500);
/// ```
#[derive(Debug)]
pub struct SimulatedTimeSource {
    /// Milliseconds since the Unix epoch.
    current_time_ms: Cell<i64>,
}

impl SimulatedTimeSource {
    #[must_use]
    pub const fn new(initial_time_ms: i64) -> Self {
        Self {
            current_time_ms: Cell::new(initial_time_ms),
        }
    }

    /// Start at `1_700_000_000_000` (November 2023).
    #[must_use]
    pub const fn default_start() -> Self {
        Self::new(1_700_000_000_000)
    }

    /// Advance time by `ms` milliseconds, saturating on overflow.
    pub fn advance(&self, ms: i64) {
        let current = self.current_time_ms.get();
        self.current_time_ms.set(current.saturating_add(ms));
    }

    /// Set the current time. May move time backwards.
    pub fn set(&self, time_ms: i64) {
        self.current_time_ms.set(time_ms);
    }

    #[must_use]
    pub fn current_ms(&self) -> i64 {
        self.current_time_ms.get()
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.current_time_ms.get()).unwrap_or_default()
    }
}

impl Default for SimulatedTimeSource {
    fn default() -> Self {
        Self::default_start()
    }
}

impl Clone for SimulatedTimeSource {
    fn clone(&self) -> Self {
        Self::new(self.current_time_ms.get())
    }
}
