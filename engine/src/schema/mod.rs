//! Record schemas.
//!
//! A schema maps each field of a record type to a [`FieldType`]. Schemas
//! are owned by storage; the engine only derives candidate schemas from
//! incoming records and asks storage to extend what it has. Types are
//! never narrowed or removed.

pub mod merger;

use std::collections::BTreeMap;
use std::fmt;

pub use merger::{SchemaConflict, SchemaMerger, derive_record_schema};

/// The type of a record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    DateTime,
    Asset,
    /// Reference to records of the named type.
    Reference(String),
    Location,
    Sequence,
    /// A storage-native type the engine does not model.
    Unknown(Option<String>),
    /// Nested lists and objects.
    Json,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Integer => f.write_str("integer"),
            Self::Boolean => f.write_str("boolean"),
            Self::DateTime => f.write_str("datetime"),
            Self::Asset => f.write_str("asset"),
            Self::Reference(record_type) => write!(f, "ref({record_type})"),
            Self::Location => f.write_str("location"),
            Self::Sequence => f.write_str("sequence"),
            Self::Unknown(Some(underlying)) => write!(f, "unknown({underlying})"),
            Self::Unknown(None) => f.write_str("unknown"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Field name to field type for one record type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordSchema(pub BTreeMap<String, FieldType>);

impl RecordSchema {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, field_type: FieldType) -> Self {
        self.0.insert(field.into(), field_type);
        self
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldType> {
        self.0.get(field)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldType)> {
        self.0.iter()
    }

    pub fn insert(&mut self, field: String, field_type: FieldType) -> Option<FieldType> {
        self.0.insert(field, field_type)
    }
}
