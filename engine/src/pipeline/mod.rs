//! The record engine.
//!
//! Life of a write:
//! 1. Parse payloads into records (or IDs for delete)
//! 2. For each record: fetch or create, check record ACL, drop unwritable
//!    fields, merge, run before hooks
//! 3. Merge the implied schemas of the batch and extend storage
//! 4. Write each record's delta
//! 5. Commit or roll back (atomic mode), then run after hooks
//!
//! Life of a read:
//! 1. Parse the query and check it against the field ACL
//! 2. Run it in storage, eager load computed keys
//! 3. Project desired keys and strip unreadable fields
//!
//! # Invariants
//!
//! - In atomic mode, either every record of a batch is written or none is.
//! - In non-atomic mode, a failing record never stops its siblings.
//! - Records that failed before persistence never contribute to a schema
//!   extension.

mod atomic;
mod delete;
mod fetch;
mod query;
mod save;

use serde_json::{Map, Value as JsonValue, json};
use tracing::{debug, warn};

pub use fetch::{copy_record, derive_delta_record, fetch_or_create_record, merge_record};

use crate::acl::{AccessControl, FieldAccessMode, FieldAcl};
use crate::config::EngineConfig;
use crate::context::{AuthInfo, RequestContext};
use crate::error::EngineError;
use crate::hooks::{HookPhase, HookRunner, NoHooks};
use crate::storage::Storage;
use crate::time::{SystemTimeSource, TimeSource};
use crate::types::record::is_reserved_field;
use crate::types::{Record, RecordId, Transient};

/// Per-item failure in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemError {
    /// The `"type/key"` the item was addressed by, if it had one.
    pub id: Option<String>,
    pub error: EngineError,
}

impl ItemError {
    #[must_use]
    pub fn new(id: &RecordId, error: EngineError) -> Self {
        Self {
            id: Some(id.to_string()),
            error,
        }
    }

    /// Render as `{_id?, _type: "error", name, code, message, info?}`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let mut object = match self.error.to_json() {
            JsonValue::Object(object) => object,
            _ => Map::new(),
        };
        object.insert("_type".to_owned(), json!("error"));
        if let Some(id) = &self.id {
            object.insert("_id".to_owned(), json!(id));
        }
        JsonValue::Object(object)
    }
}

/// Outcome of one item in a batch.
pub type ItemResult<T> = Result<T, ItemError>;

/// Runs record operations against the configured collaborators.
pub struct RecordEngine<'a> {
    storage: &'a mut dyn Storage,
    access: &'a dyn AccessControl,
    hooks: &'a dyn HookRunner,
    clock: &'a dyn TimeSource,
    config: &'a EngineConfig,
}

impl<'a> RecordEngine<'a> {
    /// Create an engine with no hooks and the system clock.
    #[must_use]
    pub fn new(
        storage: &'a mut dyn Storage,
        access: &'a dyn AccessControl,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            storage,
            access,
            hooks: &NoHooks,
            clock: &SystemTimeSource,
            config,
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: &'a dyn HookRunner) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: &'a dyn TimeSource) -> Self {
        self.clock = clock;
        self
    }

    fn is_elevated(&self, ctx: &RequestContext) -> bool {
        ctx.is_elevated(&self.config.admin_roles)
    }

    /// Run an after-phase hook on a copy of `record`. Errors are logged
    /// only, the write is already committed.
    fn run_after_hooks(&self, phase: HookPhase, record: &Record, original: Option<&Record>) {
        let mut record = copy_record(record);
        if let Err(e) = self.hooks.execute_hooks(phase, &mut record, original) {
            warn!(id = %record.id, %phase, error = %e, "after hook failed");
        }
    }
}

/// Render a batch as `{"result": [...]}`.
fn batch_response<T>(items: &[ItemResult<T>], render: impl Fn(&T) -> JsonValue) -> JsonValue {
    let result: Vec<JsonValue> = items
        .iter()
        .map(|item| match item {
            Ok(value) => render(value),
            Err(e) => e.to_json(),
        })
        .collect();
    json!({ "result": result })
}

/// Read the optional `atomic` flag of a write request.
fn parse_atomic(map: &Map<String, JsonValue>) -> Result<bool, EngineError> {
    match map.get("atomic") {
        None | Some(JsonValue::Null) => Ok(false),
        Some(JsonValue::Bool(atomic)) => Ok(*atomic),
        Some(_) => Err(EngineError::invalid_argument(
            "atomic must be a boolean",
            &["atomic"],
        )),
    }
}

/// Parse the `ids` list of a delete or fetch request.
fn parse_ids(payload: &JsonValue) -> Result<Vec<ItemResult<RecordId>>, EngineError> {
    let Some(raw_ids) = payload.get("ids").and_then(JsonValue::as_array) else {
        return Err(EngineError::invalid_argument(
            "ids must be a list of record ids",
            &["ids"],
        ));
    };
    if raw_ids.is_empty() {
        return Err(EngineError::invalid_argument("no ids given", &["ids"]));
    }

    Ok(raw_ids
        .iter()
        .map(|raw| {
            let Some(raw) = raw.as_str() else {
                return Err(ItemError {
                    id: None,
                    error: EngineError::invalid_argument("record id must be a string", &["ids"]),
                });
            };
            RecordId::parse(raw).map_err(|e| ItemError {
                id: Some(raw.to_owned()),
                error: EngineError::invalid_argument(e.to_string(), &["ids"]),
            })
        })
        .collect())
}

/// Remove fields the viewer may not read, here and in eager-loaded records.
fn strip_unreadable(field_acl: &FieldAcl, record: &mut Record, auth: Option<&AuthInfo>) {
    let owner = (!record.owner_id.is_empty()).then(|| record.owner_id.clone());
    record.data.retain(|field, _| {
        is_reserved_field(field)
            || field_acl.accessible(
                &record.id.record_type,
                field,
                FieldAccessMode::Readable,
                auth,
                owner.as_deref(),
            )
    });
    for transient in record.transient.values_mut() {
        if let Transient::Record(target) = transient {
            strip_unreadable(field_acl, target, auth);
        }
    }
}

/// Remove incoming fields the viewer may not write.
fn drop_unwritable(field_acl: &FieldAcl, record: &mut Record, auth: &AuthInfo, owner: &str) {
    record.data.retain(|field, _| {
        let writable = is_reserved_field(field)
            || field_acl.accessible(
                &record.id.record_type,
                field,
                FieldAccessMode::Writable,
                Some(auth),
                Some(owner),
            );
        if !writable {
            debug!(id = %record.id, field = %field, "dropped unwritable field");
        }
        writable
    });
}
