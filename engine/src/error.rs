//! Error kinds surfaced by the record engine.
//!
//! Every failure that reaches a caller is an [`EngineError`]: an
//! [`ErrorKind`], a human-readable message and an optional structured
//! `info` payload (for example the offending `arguments`, or the
//! per-record map of an atomic failure).
//!
//! # Invariants
//!
//! - Error kinds are a closed set; each has a stable name and numeric code.
//! - `info`, when present, is always a JSON object.

use std::fmt;

use serde_json::{Map, Value as JsonValue, json};

/// Category of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request carries no authenticated user but needs one.
    NotAuthenticated,
    /// Record ACL denied the operation, or the record type is protected.
    PermissionDenied,
    /// Malformed payload, query shape, keypath or arity.
    InvalidArgument,
    /// A referenced record does not exist.
    ResourceNotFound,
    /// Schema merge or extension produced a type conflict.
    IncompatibleSchema,
    /// One or more records in an atomic batch failed; nothing was committed.
    AtomicOperationFailure,
    /// A query is structurally invalid against the record schema.
    RecordQueryInvalid,
    /// Field ACL forbids a field referenced by a query.
    RecordQueryDenied,
    /// Storage-layer failure that is not otherwise classified.
    UnexpectedError,
}

impl ErrorKind {
    /// Stable name of the kind, as rendered to clients.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NotAuthenticated => "NotAuthenticated",
            Self::PermissionDenied => "PermissionDenied",
            Self::InvalidArgument => "InvalidArgument",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::IncompatibleSchema => "IncompatibleSchema",
            Self::AtomicOperationFailure => "AtomicOperationFailure",
            Self::RecordQueryInvalid => "RecordQueryInvalid",
            Self::RecordQueryDenied => "RecordQueryDenied",
            Self::UnexpectedError => "UnexpectedError",
        }
    }

    /// Numeric code of the kind.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::NotAuthenticated => 101,
            Self::PermissionDenied => 102,
            Self::InvalidArgument => 108,
            Self::ResourceNotFound => 110,
            Self::IncompatibleSchema => 114,
            Self::AtomicOperationFailure => 115,
            Self::RecordQueryInvalid => 120,
            Self::RecordQueryDenied => 124,
            Self::UnexpectedError => 10000,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error returned by the record engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineError {
    kind: ErrorKind,
    message: String,
    info: Option<Map<String, JsonValue>>,
}

impl EngineError {
    /// Create an error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            info: None,
        }
    }

    /// Create an `InvalidArgument` error naming the offending arguments.
    ///
    /// The argument names are carried in `info.arguments`.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>, arguments: &[&str]) -> Self {
        let mut info = Map::new();
        info.insert("arguments".to_owned(), json!(arguments));
        Self {
            kind: ErrorKind::InvalidArgument,
            message: message.into(),
            info: Some(info),
        }
    }

    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    #[must_use]
    pub fn not_authenticated() -> Self {
        Self::new(
            ErrorKind::NotAuthenticated,
            "an authenticated user is required for this operation",
        )
    }

    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnexpectedError, message)
    }

    /// Attach a structured info payload, replacing any previous one.
    #[must_use]
    pub fn with_info(mut self, info: Map<String, JsonValue>) -> Self {
        self.info = Some(info);
        self
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn info(&self) -> Option<&Map<String, JsonValue>> {
        self.info.as_ref()
    }

    /// Render the error as `{name, code, message, info?}`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let mut object = Map::new();
        object.insert("name".to_owned(), json!(self.kind.name()));
        object.insert("code".to_owned(), json!(self.kind.code()));
        object.insert("message".to_owned(), json!(self.message));
        if let Some(info) = &self.info {
            object.insert("info".to_owned(), JsonValue::Object(info.clone()));
        }
        JsonValue::Object(object)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for EngineError {}
