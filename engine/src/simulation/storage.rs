//! Fault injection around any storage collaborator.
//!
//! Faults are injected on the write path only:
//! - Record writes (`save`, `save_delta`, `delete`)
//! - Schema extension
//! - Transaction begin and commit
//!
//! Reads always pass through, so invariant checks see the real state.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::query::Query;
use crate::schema::RecordSchema;
use crate::storage::{QueryResult, Storage, StorageError};
use crate::types::{Record, RecordId};

/// Configuration for fault injection.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Probability of a record write error (0.0 - 1.0).
    pub write_error_rate: f64,
    /// Probability of a schema extension error (0.0 - 1.0).
    pub extend_error_rate: f64,
    /// Probability of a begin or commit error (0.0 - 1.0).
    pub transaction_error_rate: f64,
}

impl FaultConfig {
    /// No faults, for baseline testing.
    #[must_use]
    pub fn no_faults() -> Self {
        Self::default()
    }

    /// Low fault rates, for stress testing.
    #[must_use]
    pub const fn low_faults() -> Self {
        Self {
            write_error_rate: 0.01,
            extend_error_rate: 0.005,
            transaction_error_rate: 0.005,
        }
    }

    /// High fault rates, for extreme testing.
    #[must_use]
    pub const fn high_faults() -> Self {
        Self {
            write_error_rate: 0.1,
            extend_error_rate: 0.05,
            transaction_error_rate: 0.05,
        }
    }
}

/// Statistics about storage operations seen by [`FaultyStorage`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FaultyStorageStats {
    pub writes: u64,
    pub extends: u64,
    pub commits: u64,
    pub rollbacks: u64,
    pub injected_write_errors: u64,
    pub injected_extend_errors: u64,
    pub injected_transaction_errors: u64,
}

/// A storage wrapper that fails on purpose.
///
/// Besides random faults, writes to IDs registered with
/// [`fail_writes_to`](Self::fail_writes_to) always fail.
pub struct FaultyStorage<S> {
    inner: S,
    fault_config: FaultConfig,
    rng: StdRng,
    failing_ids: BTreeSet<RecordId>,
    stats: FaultyStorageStats,
}

impl<S: Storage> FaultyStorage<S> {
    /// Wrap `inner`, seeding fault decisions with `seed`.
    ///
    /// The same seed produces the same sequence of faults.
    #[must_use]
    pub fn new(inner: S, seed: u64, fault_config: FaultConfig) -> Self {
        Self {
            inner,
            fault_config,
            rng: StdRng::seed_from_u64(seed),
            failing_ids: BTreeSet::new(),
            stats: FaultyStorageStats::default(),
        }
    }

    /// Make every write to `id` fail.
    pub fn fail_writes_to(&mut self, id: RecordId) {
        self.failing_ids.insert(id);
    }

    pub fn clear_failing_ids(&mut self) {
        self.failing_ids.clear();
    }

    pub const fn set_fault_config(&mut self, config: FaultConfig) {
        self.fault_config = config;
    }

    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    #[must_use]
    pub const fn stats(&self) -> &FaultyStorageStats {
        &self.stats
    }

    fn should_inject_fault(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        self.rng.random::<f64>() < rate
    }

    fn check_write(&mut self, id: &RecordId) -> Result<(), StorageError> {
        self.stats.writes += 1;
        let rate = self.fault_config.write_error_rate;
        if self.failing_ids.contains(id) || self.should_inject_fault(rate) {
            self.stats.injected_write_errors += 1;
            debug!(id = %id, "injected write error");
            return Err(StorageError::Other(format!("injected write error on {id}")));
        }
        Ok(())
    }

    fn check_transaction(&mut self, operation: &str) -> Result<(), StorageError> {
        if self.should_inject_fault(self.fault_config.transaction_error_rate) {
            self.stats.injected_transaction_errors += 1;
            debug!(operation, "injected transaction error");
            return Err(StorageError::Other(format!("injected {operation} error")));
        }
        Ok(())
    }
}

impl<S: Storage> Storage for FaultyStorage<S> {
    fn get(&self, id: &RecordId) -> Result<Record, StorageError> {
        self.inner.get(id)
    }

    fn get_by_ids(&self, ids: &[RecordId]) -> Result<Vec<Record>, StorageError> {
        self.inner.get_by_ids(ids)
    }

    fn save(&mut self, record: &Record) -> Result<(), StorageError> {
        self.check_write(&record.id)?;
        self.inner.save(record)
    }

    fn save_delta(
        &mut self,
        delta: &Record,
        base: Option<&Record>,
        full: &Record,
    ) -> Result<(), StorageError> {
        self.check_write(&delta.id)?;
        self.inner.save_delta(delta, base, full)
    }

    fn delete(&mut self, id: &RecordId) -> Result<(), StorageError> {
        self.check_write(id)?;
        self.inner.delete(id)
    }

    fn query(&self, query: &Query) -> Result<QueryResult, StorageError> {
        self.inner.query(query)
    }

    fn extend(&mut self, record_type: &str, schema: &RecordSchema) -> Result<bool, StorageError> {
        self.stats.extends += 1;
        if self.should_inject_fault(self.fault_config.extend_error_rate) {
            self.stats.injected_extend_errors += 1;
            debug!(record_type, "injected extend error");
            return Err(StorageError::Other(format!(
                "injected extend error on {record_type}"
            )));
        }
        self.inner.extend(record_type, schema)
    }

    fn get_schema(&self, record_type: &str) -> Result<RecordSchema, StorageError> {
        self.inner.get_schema(record_type)
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        self.check_transaction("begin")?;
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.check_transaction("commit")?;
        self.stats.commits += 1;
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        self.stats.rollbacks += 1;
        self.inner.rollback()
    }
}
