use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::context::{AuthInfo, RequestContext};
use crate::error::EngineError;
use crate::hooks::HookPhase;
use crate::pipeline::{
    ItemError, ItemResult, RecordEngine, batch_response, copy_record, derive_delta_record,
    drop_unwritable, fetch_or_create_record, merge_record, parse_atomic, strip_unreadable,
};
use crate::schema::{SchemaMerger, derive_record_schema};
use crate::types::{JsonSerializable, Record};

/// A record ready to be written.
struct PreparedRecord {
    /// The stored version, `None` for a new record.
    base: Option<Record>,
    /// The record after merge and before-save hooks.
    full: Record,
}

/// A record that was written, with the version it replaced.
struct SavedRecord {
    record: Record,
    original: Option<Record>,
}

impl RecordEngine<'_> {
    /// Save a batch of record payloads.
    ///
    /// Request: `{"records": [...], "atomic"?: bool}`. The response holds
    /// one saved record or error per payload, in request order.
    pub fn save(
        &mut self,
        ctx: &RequestContext,
        payload: &JsonValue,
    ) -> Result<JsonValue, EngineError> {
        let Some(map) = payload.as_object() else {
            return Err(EngineError::invalid_argument(
                "save request must be an object",
                &["records"],
            ));
        };
        let atomic = parse_atomic(map)?;
        let Some(raw_records) = map.get("records").and_then(JsonValue::as_array) else {
            return Err(EngineError::invalid_argument(
                "records must be a list of records",
                &["records"],
            ));
        };
        if raw_records.is_empty() {
            return Err(EngineError::invalid_argument("no records given", &["records"]));
        }

        let items = raw_records
            .iter()
            .map(|raw| {
                Record::from_payload(raw).map_err(|error| ItemError {
                    id: raw.get("_id").and_then(JsonValue::as_str).map(str::to_owned),
                    error,
                })
            })
            .collect();

        let saved = self.save_items(ctx, items, atomic)?;
        Ok(batch_response(&saved, Record::to_json))
    }

    /// Save already parsed records.
    pub fn save_records(
        &mut self,
        ctx: &RequestContext,
        records: Vec<Record>,
        atomic: bool,
    ) -> Result<Vec<ItemResult<Record>>, EngineError> {
        self.save_items(ctx, records.into_iter().map(Ok).collect(), atomic)
    }

    fn save_items(
        &mut self,
        ctx: &RequestContext,
        items: Vec<ItemResult<Record>>,
        atomic: bool,
    ) -> Result<Vec<ItemResult<Record>>, EngineError> {
        let Some(auth) = ctx.auth.as_ref() else {
            return Err(EngineError::not_authenticated());
        };
        let elevated = self.is_elevated(ctx);

        let saved = self.execute_batch(atomic, |engine| {
            engine.save_batch(auth, elevated, items, atomic)
        })?;

        let field_acl = self.access.field_access();
        Ok(saved
            .into_iter()
            .map(|item| {
                item.map(|SavedRecord { mut record, original }| {
                    self.run_after_hooks(HookPhase::AfterSave, &record, original.as_ref());
                    if !elevated {
                        strip_unreadable(field_acl, &mut record, Some(auth));
                    }
                    record
                })
            })
            .collect())
    }

    fn save_batch(
        &mut self,
        auth: &AuthInfo,
        elevated: bool,
        items: Vec<ItemResult<Record>>,
        atomic: bool,
    ) -> Result<Vec<ItemResult<SavedRecord>>, EngineError> {
        let now = self.clock.now();
        let prepared: Vec<ItemResult<PreparedRecord>> = items
            .into_iter()
            .map(|item| {
                item.and_then(|incoming| {
                    let id = incoming.id.clone();
                    self.prepare_record(auth, elevated, now, incoming)
                        .map_err(|e| ItemError::new(&id, e))
                })
            })
            .collect();

        // Failed records must not reach the schema. In atomic mode the
        // batch is about to roll back, so nothing is extended at all.
        if atomic && prepared.iter().any(Result::is_err) {
            return Ok(prepared
                .into_iter()
                .map(|item| {
                    item.map(|p| SavedRecord {
                        record: p.full,
                        original: p.base,
                    })
                })
                .collect());
        }

        let mut merger = SchemaMerger::new();
        for p in prepared.iter().flatten() {
            merger.extend(&p.full.id.record_type, &derive_record_schema(&p.full));
        }
        for (record_type, schema) in merger.finish()? {
            if self.storage.extend(&record_type, &schema)? {
                info!(record_type = %record_type, "extended record schema");
            }
        }

        Ok(prepared
            .into_iter()
            .map(|item| {
                item.and_then(|PreparedRecord { base, full }| {
                    match self.persist(base.as_ref(), &full) {
                        Ok(record) => Ok(SavedRecord {
                            record,
                            original: base,
                        }),
                        Err(e) => Err(ItemError::new(&full.id, e)),
                    }
                })
            })
            .collect())
    }

    /// Fetch the stored version, apply the incoming fields and run the
    /// before-save hooks.
    fn prepare_record(
        &self,
        auth: &AuthInfo,
        elevated: bool,
        now: DateTime<Utc>,
        mut incoming: Record,
    ) -> Result<PreparedRecord, EngineError> {
        let base = fetch_or_create_record(
            &*self.storage,
            self.access,
            &incoming.id,
            Some(auth),
            elevated,
        )?;

        if !elevated {
            let owner = base
                .as_ref()
                .map_or(auth.user_id.as_str(), |base| base.owner_id.as_str());
            drop_unwritable(self.access.field_access(), &mut incoming, auth, owner);
        }

        let mut full = match &base {
            Some(base) => copy_record(base),
            None => {
                let mut record = Record::new(incoming.id.clone());
                record.owner_id.clone_from(&auth.user_id);
                record.created_at = Some(now);
                record.created_by.clone_from(&auth.user_id);
                record.acl = self
                    .access
                    .default_record_access(&incoming.id.record_type)
                    .cloned();
                record
            }
        };
        merge_record(&mut full, &incoming);
        full.updated_at = Some(now);
        full.updated_by.clone_from(&auth.user_id);

        self.hooks
            .execute_hooks(HookPhase::BeforeSave, &mut full, base.as_ref())?;

        debug!(id = %full.id, new = base.is_none(), "prepared record");
        Ok(PreparedRecord { base, full })
    }

    /// Write the delta of `full` and read back the stored result.
    fn persist(&mut self, base: Option<&Record>, full: &Record) -> Result<Record, EngineError> {
        let delta = derive_delta_record(base, full);
        self.storage.save_delta(&delta, base, full)?;
        debug!(id = %full.id, fields = delta.data.len(), "saved record");
        Ok(self.storage.get(&full.id)?)
    }
}
