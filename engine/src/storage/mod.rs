//! Storage collaborator.
//!
//! The engine never touches physical storage. It talks to a [`Storage`]
//! implementation through typed records, and decides only when to
//! begin, commit or roll back a transaction.
//!
//! [`MemoryStore`] is the in-memory implementation used by tests and by
//! embedders that need no persistence.

mod filter;
mod memory;

pub use memory::MemoryStore;

use crate::error::{EngineError, ErrorKind};
use crate::query::Query;
use crate::schema::{RecordSchema, SchemaConflict};
use crate::types::{Record, RecordId};

/// Error returned by a storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The record does not exist.
    NotFound(RecordId),
    /// A requested schema extension conflicts with the stored schema.
    SchemaConflict(SchemaConflict),
    /// `commit` or `rollback` was called outside a transaction.
    NoTransaction,
    /// `begin` was called inside a transaction.
    TransactionInProgress,
    /// Any other failure.
    Other(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "record {id} not found"),
            Self::SchemaConflict(conflict) => write!(f, "{conflict}"),
            Self::NoTransaction => write!(f, "no transaction in progress"),
            Self::TransactionInProgress => write!(f, "a transaction is already in progress"),
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => Self::new(ErrorKind::ResourceNotFound, e.to_string()),
            StorageError::SchemaConflict(conflict) => conflict.into(),
            other => Self::unexpected(other.to_string()),
        }
    }
}

/// The result of a storage query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    /// The requested page of matching records.
    pub records: Vec<Record>,
    /// Total matches before offset and limit, when the query asked for it.
    pub count: Option<u64>,
}

/// Abstraction over record storage.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - `get` and `get_by_ids` see every write made before them, including
///   writes inside the current transaction
/// - `rollback` discards every write since `begin`, schema extensions
///   included
/// - `extend` only ever adds fields, and reports a conflict instead of
///   changing the type of an existing field
/// - `query` honours record-level read ACL for `view_as_user` unless
///   `bypass_access_control` is set
pub trait Storage {
    // ========== Records ==========

    /// Fetch a single record.
    fn get(&self, id: &RecordId) -> Result<Record, StorageError>;

    /// Fetch several records. Missing records are skipped.
    fn get_by_ids(&self, ids: &[RecordId]) -> Result<Vec<Record>, StorageError>;

    /// Write a whole record, replacing any stored version.
    fn save(&mut self, record: &Record) -> Result<(), StorageError>;

    /// Write the fields of `delta` over the stored record.
    ///
    /// `base` is the version the delta was computed against, or `None`
    /// for a new record. `full` is the complete record after the write.
    fn save_delta(
        &mut self,
        delta: &Record,
        base: Option<&Record>,
        full: &Record,
    ) -> Result<(), StorageError>;

    fn delete(&mut self, id: &RecordId) -> Result<(), StorageError>;

    /// Run a query.
    fn query(&self, query: &Query) -> Result<QueryResult, StorageError>;

    // ========== Schema ==========

    /// Add the fields of `schema` missing from the stored schema of
    /// `record_type`.
    ///
    /// Returns whether anything was added.
    fn extend(&mut self, record_type: &str, schema: &RecordSchema) -> Result<bool, StorageError>;

    /// The stored schema of `record_type`. Unknown types have an empty schema.
    fn get_schema(&self, record_type: &str) -> Result<RecordSchema, StorageError>;

    // ========== Transactions ==========

    fn begin(&mut self) -> Result<(), StorageError>;

    fn commit(&mut self) -> Result<(), StorageError>;

    fn rollback(&mut self) -> Result<(), StorageError>;
}
