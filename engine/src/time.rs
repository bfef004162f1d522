//! Time source abstraction for deterministic testing.
//!
//! This module provides a `TimeSource` trait that abstracts over the clock
//! used to stamp `_created_at` and `_updated_at`, allowing the engine to use
//! real system time in production and simulated time in tests.

use chrono::{DateTime, Utc};

/// Abstraction over time operations.
pub trait TimeSource {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Real time source using the system clock.
///
/// This is the default implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
