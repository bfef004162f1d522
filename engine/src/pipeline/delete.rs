use serde_json::{Value as JsonValue, json};
use tracing::debug;

use crate::acl::{AccessLevel, record_accessible};
use crate::context::{AuthInfo, RequestContext};
use crate::error::EngineError;
use crate::hooks::HookPhase;
use crate::pipeline::{ItemError, ItemResult, RecordEngine, batch_response, parse_atomic, parse_ids};
use crate::types::{Record, RecordId};

impl RecordEngine<'_> {
    /// Delete a batch of records.
    ///
    /// Request: `{"ids": ["type/key", ...], "atomic"?: bool}`. Each
    /// deleted record is echoed back as `{"_id", "_type": "record"}`.
    pub fn delete(
        &mut self,
        ctx: &RequestContext,
        payload: &JsonValue,
    ) -> Result<JsonValue, EngineError> {
        let Some(map) = payload.as_object() else {
            return Err(EngineError::invalid_argument(
                "delete request must be an object",
                &["ids"],
            ));
        };
        let atomic = parse_atomic(map)?;
        let ids = parse_ids(payload)?;

        let deleted = self.delete_items(ctx, ids, atomic)?;
        Ok(batch_response(&deleted, |id| {
            json!({"_id": id.to_string(), "_type": "record"})
        }))
    }

    /// Delete records by ID.
    pub fn delete_records(
        &mut self,
        ctx: &RequestContext,
        ids: Vec<RecordId>,
        atomic: bool,
    ) -> Result<Vec<ItemResult<RecordId>>, EngineError> {
        self.delete_items(ctx, ids.into_iter().map(Ok).collect(), atomic)
    }

    fn delete_items(
        &mut self,
        ctx: &RequestContext,
        ids: Vec<ItemResult<RecordId>>,
        atomic: bool,
    ) -> Result<Vec<ItemResult<RecordId>>, EngineError> {
        let Some(auth) = ctx.auth.as_ref() else {
            return Err(EngineError::not_authenticated());
        };

        let config = self.config;
        if ids
            .iter()
            .flatten()
            .any(|id| id.record_type == config.user_record_type)
        {
            return Err(EngineError::permission_denied(format!(
                "cannot delete records of type \"{}\"",
                config.user_record_type
            )));
        }

        let elevated = self.is_elevated(ctx);
        let deleted = self.execute_batch(atomic, |engine| {
            Ok(ids
                .into_iter()
                .map(|item| {
                    item.and_then(|id| {
                        engine
                            .delete_record(auth, elevated, &id)
                            .map_err(|e| ItemError::new(&id, e))
                    })
                })
                .collect())
        })?;

        Ok(deleted
            .into_iter()
            .map(|item| {
                item.map(|record| {
                    self.run_after_hooks(HookPhase::AfterDelete, &record, None);
                    record.id
                })
            })
            .collect())
    }

    fn delete_record(
        &mut self,
        auth: &AuthInfo,
        elevated: bool,
        id: &RecordId,
    ) -> Result<Record, EngineError> {
        let mut record = self.storage.get(id)?;
        if !elevated && !record_accessible(&record, Some(auth), AccessLevel::Write) {
            return Err(EngineError::permission_denied(format!(
                "no permission to delete record {id}"
            )));
        }

        self.hooks
            .execute_hooks(HookPhase::BeforeDelete, &mut record, None)?;
        self.storage.delete(id)?;
        debug!(id = %id, "deleted record");
        Ok(record)
    }
}
