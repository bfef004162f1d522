//! Eager loading of referenced records into `_transient`.
//!
//! For every computed key that is a plain keypath, the value at the path
//! is read on each result record. References are resolved to their target
//! records with one batched `get_by_ids` per hop. The reserved user
//! fields (`_owner_id`, `_created_by`, `_updated_by`) hold bare user IDs
//! and are resolved against the user record type.
//!
//! # Post-conditions
//!
//! - Every result record carries an entry for every keypath computed key.
//!   An absent value, a dangling reference or a target the viewer cannot
//!   read is an explicit `Transient::Null`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::acl::{AccessLevel, record_accessible};
use crate::error::EngineError;
use crate::query::types::{Expression, Query};
use crate::storage::Storage;
use crate::types::record::is_user_reference_field;
use crate::types::{Record, RecordId, Transient, Value};

/// Resolves keypath computed keys for a page of query results.
pub struct EagerLoader<'a> {
    storage: &'a dyn Storage,
    user_record_type: &'a str,
}

/// What a keypath resolved to on one record.
enum Resolved {
    Missing,
    Reference(RecordId),
    Value(Value),
}

impl<'a> EagerLoader<'a> {
    #[must_use]
    pub const fn new(storage: &'a dyn Storage, user_record_type: &'a str) -> Self {
        Self {
            storage,
            user_record_type,
        }
    }

    /// Attach the keypath computed keys of `query` to `records`.
    pub fn load(&self, query: &Query, records: &mut [Record]) -> Result<(), EngineError> {
        for (name, expression) in &query.computed_keys {
            let Expression::KeyPath(path) = expression else {
                continue;
            };
            let resolved = self.resolve_path(query, records, path)?;

            let targets: BTreeSet<RecordId> = resolved
                .iter()
                .filter_map(|r| match r {
                    Resolved::Reference(id) => Some(id.clone()),
                    _ => None,
                })
                .collect();
            let loaded = self.fetch_readable(query, &targets)?;
            debug!(
                key = %name,
                path = %path,
                requested = targets.len(),
                loaded = loaded.len(),
                "eager loaded keypath"
            );

            for (record, resolved) in records.iter_mut().zip(resolved) {
                let transient = match resolved {
                    Resolved::Missing => Transient::Null,
                    Resolved::Value(value) => Transient::Value(value),
                    Resolved::Reference(id) => loaded.get(&id).map_or(Transient::Null, |target| {
                        Transient::Record(Box::new(target.clone()))
                    }),
                };
                record.transient.insert(name.clone(), transient);
            }
        }
        Ok(())
    }

    /// Walk `path` on every record, fetching intermediate records a hop at
    /// a time.
    fn resolve_path(
        &self,
        query: &Query,
        records: &[Record],
        path: &str,
    ) -> Result<Vec<Resolved>, EngineError> {
        let components: Vec<&str> = path.split('.').collect();
        let Some((first, rest)) = components.split_first() else {
            return Ok(records.iter().map(|_| Resolved::Missing).collect());
        };

        let mut resolved: Vec<Resolved> = records
            .iter()
            .map(|record| self.resolve_field(record, first))
            .collect();

        for component in rest {
            let hop: BTreeSet<RecordId> = resolved
                .iter()
                .filter_map(|r| match r {
                    Resolved::Reference(id) => Some(id.clone()),
                    _ => None,
                })
                .collect();
            let intermediate = self.fetch_readable(query, &hop)?;

            resolved = resolved
                .into_iter()
                .map(|r| match r {
                    Resolved::Reference(id) => intermediate
                        .get(&id)
                        .map_or(Resolved::Missing, |record| self.resolve_field(record, component)),
                    Resolved::Missing | Resolved::Value(_) => Resolved::Missing,
                })
                .collect();
        }
        Ok(resolved)
    }

    fn resolve_field(&self, record: &Record, field: &str) -> Resolved {
        match record.get(field).map(std::borrow::Cow::into_owned) {
            None | Some(Value::Null) => Resolved::Missing,
            Some(Value::Reference(id)) => Resolved::Reference(id),
            Some(Value::String(user_id)) if is_user_reference_field(field) => {
                Resolved::Reference(RecordId::new(self.user_record_type, user_id))
            }
            Some(value) => Resolved::Value(value),
        }
    }

    fn fetch_readable(
        &self,
        query: &Query,
        ids: &BTreeSet<RecordId>,
    ) -> Result<BTreeMap<RecordId, Record>, EngineError> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let ids: Vec<RecordId> = ids.iter().cloned().collect();
        let auth = query.view_as_user.as_ref();
        Ok(self
            .storage
            .get_by_ids(&ids)?
            .into_iter()
            .filter(|record| {
                query.bypass_access_control || record_accessible(record, auth, AccessLevel::Read)
            })
            .map(|record| (record.id.clone(), record))
            .collect())
    }
}
