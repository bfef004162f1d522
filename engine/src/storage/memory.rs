//! In-memory record store.
//!
//! Records, schemas and sequence counters live in one state value.
//! `begin` snapshots it, `rollback` restores the snapshot and `commit`
//! drops it. User relations are configuration and sit outside
//! transactions.
//!
//! # Thread Safety
//!
//! Not thread-safe. Each request holds the store exclusively through
//! `&mut`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::acl::{AccessLevel, record_accessible};
use crate::query::{Expression, Query};
use crate::schema::{RecordSchema, SchemaConflict};
use crate::storage::filter::{Evaluator, Relation};
use crate::storage::{QueryResult, Storage, StorageError};
use crate::types::{Record, RecordId, Transient, Value};

#[derive(Debug, Clone, Default)]
struct StoreState {
    records: BTreeMap<RecordId, Record>,
    schemas: BTreeMap<String, RecordSchema>,
    /// Last assigned sequence per `(record type, field)`.
    sequences: BTreeMap<(String, String), i64>,
}

impl StoreState {
    /// Replace unassigned sequence values with the next number.
    fn assign_sequences(&mut self, record: &mut Record) {
        for (field, value) in &mut record.data {
            if let Value::Sequence(None) = value {
                let last = self
                    .sequences
                    .entry((record.id.record_type.clone(), field.clone()))
                    .or_insert(0);
                *last += 1;
                *value = Value::Sequence(Some(*last));
            }
        }
    }

    fn store(&mut self, mut record: Record) {
        record.transient.clear();
        self.assign_sequences(&mut record);
        self.records.insert(record.id.clone(), record);
    }
}

/// In-memory implementation of [`Storage`].
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: StoreState,
    snapshot: Option<StoreState>,
    relations: BTreeSet<Relation>,
    user_record_type: String,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store whose user records have type `user`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_user_record_type("user")
    }

    #[must_use]
    pub fn with_user_record_type(user_record_type: impl Into<String>) -> Self {
        Self {
            state: StoreState::default(),
            snapshot: None,
            relations: BTreeSet::new(),
            user_record_type: user_record_type.into(),
        }
    }

    /// Record that user `from` has relation `name` (`_friend` or `_follow`)
    /// to user `to`.
    pub fn add_relation(&mut self, name: &str, from: &str, to: &str) {
        self.relations.insert(Relation {
            name: name.to_owned(),
            from: from.to_owned(),
            to: to.to_owned(),
        });
    }

    #[must_use]
    pub fn contains(&self, id: &RecordId) -> bool {
        self.state.records.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.records.is_empty()
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator {
            records: &self.state.records,
            relations: &self.relations,
            user_record_type: &self.user_record_type,
        }
    }
}

impl Storage for MemoryStore {
    fn get(&self, id: &RecordId) -> Result<Record, StorageError> {
        self.state
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.clone()))
    }

    fn get_by_ids(&self, ids: &[RecordId]) -> Result<Vec<Record>, StorageError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.state.records.get(id).cloned())
            .collect())
    }

    fn save(&mut self, record: &Record) -> Result<(), StorageError> {
        self.state.store(record.clone());
        Ok(())
    }

    fn save_delta(
        &mut self,
        delta: &Record,
        base: Option<&Record>,
        full: &Record,
    ) -> Result<(), StorageError> {
        let mut stored = match (self.state.records.get(&delta.id), base) {
            (Some(existing), _) => existing.clone(),
            (None, None) => full.clone(),
            (None, Some(_)) => return Err(StorageError::NotFound(delta.id.clone())),
        };

        stored.acl.clone_from(&delta.acl);
        stored.owner_id.clone_from(&delta.owner_id);
        stored.created_at = delta.created_at;
        stored.created_by.clone_from(&delta.created_by);
        stored.updated_at = delta.updated_at;
        stored.updated_by.clone_from(&delta.updated_by);
        for (field, value) in &delta.data {
            let keeps_sequence = matches!(value, Value::Sequence(None))
                && matches!(stored.data.get(field), Some(Value::Sequence(Some(_))));
            if !keeps_sequence {
                stored.data.insert(field.clone(), value.clone());
            }
        }

        debug!(id = %delta.id, fields = delta.data.len(), "saved delta");
        self.state.store(stored);
        Ok(())
    }

    fn delete(&mut self, id: &RecordId) -> Result<(), StorageError> {
        self.state
            .records
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(id.clone()))
    }

    fn query(&self, query: &Query) -> Result<QueryResult, StorageError> {
        let evaluator = self.evaluator();
        let auth = query.view_as_user.as_ref();

        let mut matched: Vec<&Record> = self
            .state
            .records
            .values()
            .filter(|record| record.id.record_type == query.record_type)
            .filter(|record| {
                query.bypass_access_control || record_accessible(record, auth, AccessLevel::Read)
            })
            .filter(|record| {
                query
                    .predicate
                    .as_ref()
                    .is_none_or(|predicate| evaluator.matches(predicate, record))
            })
            .collect();

        matched.sort_by(|a, b| {
            evaluator
                .compare_records(&query.sorts, a, b)
                .then_with(|| a.id.cmp(&b.id))
        });

        let count = query.get_count.then_some(matched.len() as u64);
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        let mut records: Vec<Record> = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        for record in &mut records {
            for (name, expression) in &query.computed_keys {
                if let Expression::Function(_) = expression {
                    let value = evaluator
                        .evaluate(expression, record)
                        .unwrap_or(Value::Null);
                    record.transient.insert(name.clone(), Transient::Value(value));
                }
            }
        }

        Ok(QueryResult { records, count })
    }

    fn extend(&mut self, record_type: &str, schema: &RecordSchema) -> Result<bool, StorageError> {
        let stored = self
            .state
            .schemas
            .entry(record_type.to_owned())
            .or_default();

        for (field, incoming) in schema.iter() {
            match stored.get(field) {
                Some(existing) if existing != incoming => {
                    return Err(StorageError::SchemaConflict(SchemaConflict {
                        record_type: record_type.to_owned(),
                        field: field.clone(),
                        existing: existing.clone(),
                        incoming: incoming.clone(),
                    }));
                }
                _ => {}
            }
        }

        let mut extended = false;
        for (field, incoming) in schema.iter() {
            if stored.get(field).is_none() {
                stored.insert(field.clone(), incoming.clone());
                extended = true;
            }
        }
        if extended {
            debug!(record_type, "extended schema");
        }
        Ok(extended)
    }

    fn get_schema(&self, record_type: &str) -> Result<RecordSchema, StorageError> {
        Ok(self
            .state
            .schemas
            .get(record_type)
            .cloned()
            .unwrap_or_default())
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        if self.snapshot.is_some() {
            return Err(StorageError::TransactionInProgress);
        }
        self.snapshot = Some(self.state.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or(StorageError::NoTransaction)
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        let snapshot = self.snapshot.take().ok_or(StorageError::NoTransaction)?;
        self.state = snapshot;
        Ok(())
    }
}
