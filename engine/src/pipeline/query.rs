use serde_json::{Value as JsonValue, json};
use tracing::debug;

use crate::acl::{AccessLevel, record_accessible};
use crate::context::RequestContext;
use crate::error::{EngineError, ErrorKind};
use crate::pipeline::{
    ItemError, ItemResult, RecordEngine, batch_response, parse_ids, strip_unreadable,
};
use crate::query::{EagerLoader, Query, QueryAccessChecker, QueryParser};
use crate::storage::{QueryResult, StorageError};
use crate::types::{JsonSerializable, Record, RecordId};

impl RecordEngine<'_> {
    /// Run a query request.
    ///
    /// The response is `{"result": [...]}`, plus `"info": {"count"}` when
    /// the query asked for a count.
    pub fn query(
        &self,
        ctx: &RequestContext,
        payload: &JsonValue,
    ) -> Result<JsonValue, EngineError> {
        let query = QueryParser::new(ctx.user_id()).parse(payload)?;
        let result = self.query_records(ctx, query)?;

        let records: Vec<JsonValue> = result.records.iter().map(Record::to_json).collect();
        let mut response = json!({ "result": records });
        if let Some(count) = result.count {
            response["info"] = json!({ "count": count });
        }
        Ok(response)
    }

    /// Run a parsed query as the request's viewer.
    ///
    /// # Pre-conditions
    ///
    /// - `query` passed `Predicate::validate` (the parser guarantees it).
    ///
    /// # Post-conditions
    ///
    /// - Every requested keypath computed key is present in each record's
    ///   transient map.
    /// - Unless elevated, no returned record carries a field the viewer
    ///   cannot read.
    pub fn query_records(
        &self,
        ctx: &RequestContext,
        mut query: Query,
    ) -> Result<QueryResult, EngineError> {
        let elevated = self.is_elevated(ctx);
        query.view_as_user.clone_from(&ctx.auth);
        query.bypass_access_control = elevated;

        let storage = &*self.storage;
        let user_record_type = self.config.user_record_type.as_str();
        let field_acl = self.access.field_access();

        QueryAccessChecker::new(field_acl, storage, user_record_type).check(&query)?;
        let mut result = storage.query(&query)?;
        EagerLoader::new(storage, user_record_type).load(&query, &mut result.records)?;

        for record in &mut result.records {
            if let Some(keys) = &query.desired_keys {
                record.data.retain(|field, _| keys.contains(field));
            }
            if !elevated {
                strip_unreadable(field_acl, record, ctx.auth.as_ref());
            }
        }

        debug!(
            record_type = %query.record_type,
            records = result.records.len(),
            "query finished"
        );
        Ok(result)
    }

    /// Fetch records by ID.
    ///
    /// Request: `{"ids": ["type/key", ...]}`.
    pub fn fetch(
        &self,
        ctx: &RequestContext,
        payload: &JsonValue,
    ) -> Result<JsonValue, EngineError> {
        let fetched: Vec<ItemResult<Record>> = parse_ids(payload)?
            .into_iter()
            .map(|item| item.and_then(|id| self.fetch_item(ctx, &id)))
            .collect();
        Ok(batch_response(&fetched, Record::to_json))
    }

    /// Fetch records by ID, one result per ID.
    #[must_use]
    pub fn fetch_records(&self, ctx: &RequestContext, ids: &[RecordId]) -> Vec<ItemResult<Record>> {
        ids.iter().map(|id| self.fetch_item(ctx, id)).collect()
    }

    fn fetch_item(&self, ctx: &RequestContext, id: &RecordId) -> ItemResult<Record> {
        let elevated = self.is_elevated(ctx);
        let auth = ctx.auth.as_ref();

        let mut record = match self.storage.get(id) {
            Ok(record) => record,
            Err(StorageError::NotFound(_)) => {
                return Err(ItemError::new(
                    id,
                    EngineError::new(ErrorKind::ResourceNotFound, format!("record {id} not found")),
                ));
            }
            Err(e) => return Err(ItemError::new(id, e.into())),
        };

        if !elevated {
            if !record_accessible(&record, auth, AccessLevel::Read) {
                return Err(ItemError::new(
                    id,
                    EngineError::permission_denied(format!("no permission to read record {id}")),
                ));
            }
            strip_unreadable(self.access.field_access(), &mut record, auth);
        }
        Ok(record)
    }
}
