//! Deterministic Simulation Testing (DST) infrastructure.
//!
//! This module provides tools for testing the record engine with:
//! - Controlled time (no real system time)
//! - Fault injection around any storage collaborator
//! - Reproducible random save batches
//! - Invariant checking after each batch
//!
//! Given the same seed, a run is identical.
//!
//! # Usage
//!
//! ```
//! use record_engine::simulation::{FaultConfig, Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(12345)
//!     .with_fault_config(FaultConfig::low_faults())
//!     .with_malformed_rate(0.1);
//!
//! let result = Simulator::new(config).run(100);
//! assert!(result.passed());
//! ```

mod simulator;
mod storage;
mod time;

pub use simulator::{InvariantViolation, SimulationResult, Simulator, SimulatorConfig};
pub use storage::{FaultConfig, FaultyStorage, FaultyStorageStats};
pub use time::SimulatedTimeSource;
