//! Simulator harness for deterministic simulation testing.
//!
//! Each step generates a random save batch over a small key space, runs it
//! through a [`RecordEngine`] backed by [`FaultyStorage`], and checks the
//! orchestration invariants against the store's state before and after.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value as JsonValue, json};
use tracing::info;

use super::storage::{FaultConfig, FaultyStorage};
use super::time::SimulatedTimeSource;
use crate::acl::AccessPolicy;
use crate::config::EngineConfig;
use crate::context::{AuthInfo, RequestContext};
use crate::error::ErrorKind;
use crate::pipeline::RecordEngine;
use crate::query::Query;
use crate::storage::{MemoryStore, Storage};
use crate::types::{Record, RecordId, Value};

/// The record type every generated record belongs to.
const RECORD_TYPE: &str = "note";

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    pub fault_config: FaultConfig,
    /// Number of distinct record keys batches draw from.
    pub key_space: usize,
    /// Largest batch size.
    pub max_batch_size: usize,
    /// Probability that a generated record is malformed (0.0 - 1.0).
    pub malformed_rate: f64,
    /// Probability that a batch runs in atomic mode (0.0 - 1.0).
    pub atomic_rate: f64,
    /// Milliseconds to advance time per batch.
    pub time_advance_ms: i64,
    pub engine_config: EngineConfig,
}

impl SimulatorConfig {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            fault_config: FaultConfig::default(),
            key_space: 16,
            max_batch_size: 5,
            malformed_rate: 0.0,
            atomic_rate: 0.5,
            time_advance_ms: 1,
            engine_config: EngineConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_fault_config(mut self, config: FaultConfig) -> Self {
        self.fault_config = config;
        self
    }

    #[must_use]
    pub const fn with_malformed_rate(mut self, rate: f64) -> Self {
        self.malformed_rate = rate;
        self
    }

    #[must_use]
    pub const fn with_atomic_rate(mut self, rate: f64) -> Self {
        self.atomic_rate = rate;
        self
    }

    #[must_use]
    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }
}

/// A broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    pub description: String,
    /// Index of the batch after which the violation was seen.
    pub batch_index: usize,
}

/// Results from a simulation run.
#[derive(Debug, Default)]
pub struct SimulationResult {
    pub seed: u64,
    pub batches_processed: u64,
    /// Records reported as saved.
    pub saved_records: u64,
    /// Records reported as failed, individually or through a rolled-back batch.
    pub failed_records: u64,
    pub atomic_rollbacks: u64,
    pub invariant_violations: Vec<InvariantViolation>,
}

impl SimulationResult {
    /// Whether the run saw no invariant violations.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.invariant_violations.is_empty()
    }
}

/// One generated record of a batch.
struct GeneratedRecord {
    id: RecordId,
    payload: JsonValue,
    /// The fields the record sets, `None` if the payload is malformed.
    fields: Option<BTreeMap<String, Value>>,
}

/// The simulator harness.
pub struct Simulator {
    config: SimulatorConfig,
    rng: StdRng,
    storage: FaultyStorage<MemoryStore>,
    policy: AccessPolicy,
    clock: SimulatedTimeSource,
    ctx: RequestContext,
    result: SimulationResult,
}

impl Simulator {
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let storage = FaultyStorage::new(
            MemoryStore::new(),
            config.seed,
            config.fault_config.clone(),
        );
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            storage,
            policy: AccessPolicy::new(),
            clock: SimulatedTimeSource::default_start(),
            ctx: RequestContext::user(AuthInfo::new("sim-user")),
            result: SimulationResult {
                seed: config.seed,
                ..SimulationResult::default()
            },
            config,
        }
    }

    /// Run `batch_count` save batches, checking invariants after each.
    pub fn run(mut self, batch_count: usize) -> SimulationResult {
        for batch_index in 0..batch_count {
            self.step(batch_index);
            self.clock.advance(self.config.time_advance_ms);
        }
        info!(
            seed = self.result.seed,
            batches = self.result.batches_processed,
            violations = self.result.invariant_violations.len(),
            "simulation finished"
        );
        self.result
    }

    fn step(&mut self, batch_index: usize) {
        let batch = self.generate_batch();
        let atomic = self.rng.random_bool(self.config.atomic_rate);
        let before: Vec<Option<Record>> = batch
            .iter()
            .map(|generated| self.storage.inner().get(&generated.id).ok())
            .collect();

        let payload = json!({
            "atomic": atomic,
            "records": batch.iter().map(|generated| generated.payload.clone()).collect::<Vec<_>>(),
        });
        let response =
            RecordEngine::new(&mut self.storage, &self.policy, &self.config.engine_config)
                .with_clock(&self.clock)
                .save(&self.ctx, &payload);
        self.result.batches_processed += 1;

        let mut violations = Vec::new();
        match response {
            Ok(response) => {
                let items = response["result"].as_array().cloned().unwrap_or_default();
                if items.len() != batch.len() {
                    violations.push(format!(
                        "expected {} results, got {}",
                        batch.len(),
                        items.len()
                    ));
                }
                for ((generated, before), item) in batch.iter().zip(&before).zip(&items) {
                    if item["_type"] == "record" {
                        self.result.saved_records += 1;
                        violations.extend(self.check_saved(generated));
                    } else {
                        self.result.failed_records += 1;
                        if atomic {
                            violations.push(format!(
                                "atomic batch reported a per-item error for {}",
                                generated.id
                            ));
                        }
                        violations.extend(self.check_unchanged(generated, before.as_ref()));
                    }
                }
            }
            Err(e) => {
                self.result.failed_records += batch.len() as u64;
                if atomic && e.kind() == ErrorKind::AtomicOperationFailure {
                    self.result.atomic_rollbacks += 1;
                }
                if !atomic && e.kind() == ErrorKind::AtomicOperationFailure {
                    violations.push("non-atomic batch failed as a whole".to_owned());
                }
                for (generated, before) in batch.iter().zip(&before) {
                    violations.extend(self.check_unchanged(generated, before.as_ref()));
                }
            }
        }
        violations.extend(self.check_count());

        if self.storage.inner().in_transaction() {
            violations.push("transaction left open".to_owned());
        }

        self.result
            .invariant_violations
            .extend(violations.into_iter().map(|description| InvariantViolation {
                description,
                batch_index,
            }));
    }

    fn generate_batch(&mut self) -> Vec<GeneratedRecord> {
        let mut keys: Vec<usize> = (0..self.config.key_space).collect();
        keys.shuffle(&mut self.rng);
        let size = self
            .rng
            .random_range(1..=self.config.max_batch_size.clamp(1, self.config.key_space.max(1)));

        keys.into_iter()
            .take(size)
            .map(|key| {
                let id = RecordId::new(RECORD_TYPE, key.to_string());
                let title = format!("title-{}", self.rng.random_range(0..1000));
                let rank = f64::from(self.rng.random_range(0..100_u32));

                let mut payload = Map::new();
                payload.insert("_id".to_owned(), json!(id.to_string()));
                payload.insert("title".to_owned(), json!(title));
                payload.insert("rank".to_owned(), json!(rank));

                let malformed = self.rng.random_bool(self.config.malformed_rate);
                let fields = if malformed {
                    payload.insert("_forbidden".to_owned(), json!(true));
                    None
                } else {
                    Some(BTreeMap::from([
                        ("title".to_owned(), Value::String(title)),
                        ("rank".to_owned(), Value::Number(rank)),
                    ]))
                };

                GeneratedRecord {
                    id,
                    payload: JsonValue::Object(payload),
                    fields,
                }
            })
            .collect()
    }

    fn check_saved(&self, generated: &GeneratedRecord) -> Option<String> {
        let Some(fields) = &generated.fields else {
            return Some(format!("malformed record {} reported as saved", generated.id));
        };
        let Ok(stored) = self.storage.inner().get(&generated.id) else {
            return Some(format!("saved record {} is not stored", generated.id));
        };
        fields
            .iter()
            .find(|(field, value)| stored.data.get(*field) != Some(*value))
            .map(|(field, _)| format!("field {field} of {} was not written", generated.id))
    }

    fn check_unchanged(
        &self,
        generated: &GeneratedRecord,
        before: Option<&Record>,
    ) -> Option<String> {
        let after = self.storage.inner().get(&generated.id).ok();
        (after.as_ref() != before)
            .then(|| format!("failed record {} changed in storage", generated.id))
    }

    fn check_count(&self) -> Option<String> {
        let mut query = Query::new(RECORD_TYPE);
        query.get_count = true;
        query.bypass_access_control = true;
        match self.storage.inner().query(&query) {
            Ok(result) if result.count == Some(self.storage.inner().len() as u64) => None,
            Ok(result) => Some(format!(
                "query counted {:?} records, store holds {}",
                result.count,
                self.storage.inner().len()
            )),
            Err(e) => Some(format!("count query failed: {e}")),
        }
    }
}
