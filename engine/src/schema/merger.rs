//! Schema derivation and per-batch merging.
//!
//! # Pre-conditions
//!
//! - Records handed to the merger have passed payload validation.
//!
//! # Post-conditions
//!
//! - `finish` returns one merged schema per record type, or the first
//!   conflict seen. Once a conflict is recorded, further input is ignored.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{EngineError, ErrorKind};
use crate::schema::{FieldType, RecordSchema};
use crate::types::{Record, Value};

/// Two records of one batch disagree on a field's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaConflict {
    pub record_type: String,
    pub field: String,
    pub existing: FieldType,
    pub incoming: FieldType,
}

impl fmt::Display for SchemaConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type conflict on column = {}, {} -> {}",
            self.field, self.existing, self.incoming
        )
    }
}

impl std::error::Error for SchemaConflict {}

impl From<SchemaConflict> for EngineError {
    fn from(conflict: SchemaConflict) -> Self {
        Self::new(ErrorKind::IncompatibleSchema, conflict.to_string())
    }
}

fn field_type_of(value: &Value) -> Option<FieldType> {
    let field_type = match value {
        Value::Null => return None,
        Value::Boolean(_) => FieldType::Boolean,
        Value::Integer(_) => FieldType::Integer,
        Value::Number(_) => FieldType::Number,
        Value::String(_) => FieldType::String,
        Value::DateTime(_) => FieldType::DateTime,
        Value::Asset(_) => FieldType::Asset,
        Value::Reference(id) => FieldType::Reference(id.record_type.clone()),
        Value::Location(_) => FieldType::Location,
        Value::Sequence(_) => FieldType::Sequence,
        Value::Unknown(underlying) => FieldType::Unknown(underlying.clone()),
        Value::List(_) | Value::Json(_) => FieldType::Json,
    };
    Some(field_type)
}

/// Derive the schema implied by a record's data.
///
/// Null fields carry no type and are skipped.
#[must_use]
pub fn derive_record_schema(record: &Record) -> RecordSchema {
    let mut schema = RecordSchema::new();
    for (field, value) in &record.data {
        if let Some(field_type) = field_type_of(value) {
            schema.insert(field.clone(), field_type);
        }
    }
    schema
}

/// Accumulates derived schemas across a write batch, per record type.
#[derive(Debug, Default)]
pub struct SchemaMerger {
    schemas: BTreeMap<String, RecordSchema>,
    conflict: Option<SchemaConflict>,
}

impl SchemaMerger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `schema` into the accumulator for `record_type`.
    pub fn extend(&mut self, record_type: &str, schema: &RecordSchema) {
        if self.conflict.is_some() {
            return;
        }

        let merged = self.schemas.entry(record_type.to_owned()).or_default();
        for (field, incoming) in schema.iter() {
            match merged.get(field) {
                Some(existing) if existing != incoming => {
                    self.conflict = Some(SchemaConflict {
                        record_type: record_type.to_owned(),
                        field: field.clone(),
                        existing: existing.clone(),
                        incoming: incoming.clone(),
                    });
                    return;
                }
                Some(_) => {}
                None => {
                    merged.insert(field.clone(), incoming.clone());
                }
            }
        }
    }

    /// The merged schemas, or the first conflict.
    pub fn finish(self) -> Result<BTreeMap<String, RecordSchema>, SchemaConflict> {
        match self.conflict {
            Some(conflict) => Err(conflict),
            None => Ok(self.schemas),
        }
    }
}
