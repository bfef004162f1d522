//! Records and their JSON representation.
//!
//! # Invariants
//!
//! - `data` never holds reserved (`_`-prefixed) keys; metadata lives in
//!   dedicated fields.
//! - A record is mutated only through the save pipeline, on a per-request
//!   copy.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue, json};

use crate::acl::RecordAcl;
use crate::error::EngineError;
use crate::types::value::format_datetime;
use crate::types::{JsonDeserializable, JsonSerializable, RecordId, Value};

pub const OWNER_ID_FIELD: &str = "_owner_id";
pub const CREATED_AT_FIELD: &str = "_created_at";
pub const CREATED_BY_FIELD: &str = "_created_by";
pub const UPDATED_AT_FIELD: &str = "_updated_at";
pub const UPDATED_BY_FIELD: &str = "_updated_by";

/// Reserved keys a client may send but the server manages.
const SERVER_MANAGED_KEYS: &[&str] = &[
    "_type",
    "_ownerID",
    CREATED_AT_FIELD,
    CREATED_BY_FIELD,
    UPDATED_AT_FIELD,
    UPDATED_BY_FIELD,
    "_transient",
];

/// Whether `field` is a reserved system field.
///
/// Reserved fields bypass field ACL entirely.
#[must_use]
pub fn is_reserved_field(field: &str) -> bool {
    field.starts_with('_')
}

/// Whether `field` holds a bare user ID that refers to a user record.
#[must_use]
pub fn is_user_reference_field(field: &str) -> bool {
    matches!(field, OWNER_ID_FIELD | CREATED_BY_FIELD | UPDATED_BY_FIELD)
}

/// A value attached to a query result under `_transient`.
#[derive(Debug, Clone, PartialEq)]
pub enum Transient {
    /// The requested path held no value; rendered as explicit `null`.
    Null,
    /// A computed, non-reference value.
    Value(Value),
    /// An eager-loaded referenced record.
    Record(Box<Record>),
}

/// A record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    /// `None` means the ACL was never set (public access). On a parsed
    /// payload it means `_access` was absent.
    pub acl: Option<RecordAcl>,
    pub owner_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: String,
    pub data: BTreeMap<String, Value>,
    pub transient: BTreeMap<String, Transient>,
}

impl Record {
    /// Create an empty record with no metadata.
    #[must_use]
    pub const fn new(id: RecordId) -> Self {
        Self {
            id,
            acl: None,
            owner_id: String::new(),
            created_at: None,
            created_by: String::new(),
            updated_at: None,
            updated_by: String::new(),
            data: BTreeMap::new(),
            transient: BTreeMap::new(),
        }
    }

    /// Set a user field.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.data.insert(field.into(), value);
        self
    }

    /// Read a field, resolving reserved metadata fields.
    ///
    /// The user-reference fields resolve to their bare user ID string.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Cow<'_, Value>> {
        let user_field = |s: &str| {
            (!s.is_empty()).then(|| Cow::Owned(Value::String(s.to_owned())))
        };
        match field {
            OWNER_ID_FIELD => user_field(&self.owner_id),
            CREATED_BY_FIELD => user_field(&self.created_by),
            UPDATED_BY_FIELD => user_field(&self.updated_by),
            CREATED_AT_FIELD => self.created_at.map(|dt| Cow::Owned(Value::DateTime(dt))),
            UPDATED_AT_FIELD => self.updated_at.map(|dt| Cow::Owned(Value::DateTime(dt))),
            "_id" => Some(Cow::Owned(Value::String(self.id.key.clone()))),
            _ => self.data.get(field).map(Cow::Borrowed),
        }
    }

    /// Parse a record payload.
    ///
    /// An absent `_access` leaves `acl` unset, `null` resets it to
    /// [`RecordAcl::public`], and a list replaces it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` naming the offending key if `_id` is
    /// missing or malformed, `_access` is malformed, an unknown reserved
    /// key is present, or a field value cannot be decoded.
    pub fn from_payload(payload: &JsonValue) -> Result<Self, EngineError> {
        let Some(map) = payload.as_object() else {
            return Err(EngineError::invalid_argument(
                "record payload must be an object",
                &["records"],
            ));
        };

        let id = match map.get("_id") {
            Some(JsonValue::String(raw)) => RecordId::parse(raw)
                .map_err(|e| EngineError::invalid_argument(e.to_string(), &["_id"]))?,
            _ => {
                return Err(EngineError::invalid_argument(
                    "record _id must be a \"type/key\" string",
                    &["_id"],
                ));
            }
        };

        let mut record = Self::new(id);
        record.acl = match map.get("_access") {
            None => None,
            Some(JsonValue::Null) => Some(RecordAcl::public()),
            Some(raw) => Some(
                RecordAcl::from_json(raw)
                    .map_err(|e| EngineError::invalid_argument(e, &["_access"]))?,
            ),
        };

        for (key, raw) in map {
            if key == "_id" || key == "_access" || SERVER_MANAGED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if is_reserved_field(key) {
                return Err(EngineError::invalid_argument(
                    format!("reserved key \"{key}\" cannot be set"),
                    &[key.as_str()],
                ));
            }
            let value = Value::from_json(raw).map_err(|e| {
                let message = format!("invalid value for \"{key}\": {e}");
                EngineError::invalid_argument(message, &[key.as_str()])
            })?;
            record.data.insert(key.to_owned(), value);
        }

        Ok(record)
    }
}

fn datetime_json(dt: Option<&DateTime<Utc>>) -> JsonValue {
    dt.map_or(JsonValue::Null, |dt| json!(format_datetime(dt)))
}

impl JsonSerializable<JsonValue> for Transient {
    fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Value(value) => value.to_json(),
            Self::Record(record) => record.to_json(),
        }
    }
}

impl JsonSerializable<JsonValue> for Record {
    fn to_json(&self) -> JsonValue {
        let mut object = Map::new();
        object.insert("_id".to_owned(), json!(self.id.to_string()));
        object.insert("_type".to_owned(), json!("record"));
        object.insert(
            "_access".to_owned(),
            self.acl.as_ref().map_or(JsonValue::Null, RecordAcl::to_json),
        );
        object.insert("_ownerID".to_owned(), json!(self.owner_id));
        object.insert(
            CREATED_AT_FIELD.to_owned(),
            datetime_json(self.created_at.as_ref()),
        );
        object.insert(CREATED_BY_FIELD.to_owned(), json!(self.created_by));
        object.insert(
            UPDATED_AT_FIELD.to_owned(),
            datetime_json(self.updated_at.as_ref()),
        );
        object.insert(UPDATED_BY_FIELD.to_owned(), json!(self.updated_by));

        for (key, value) in &self.data {
            object.insert(key.to_owned(), value.to_json());
        }

        if !self.transient.is_empty() {
            let transient = self
                .transient
                .iter()
                .map(|(key, value)| (key.to_owned(), value.to_json()))
                .collect();
            object.insert("_transient".to_owned(), JsonValue::Object(transient));
        }

        JsonValue::Object(object)
    }
}
