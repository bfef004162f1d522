//! Record identity.
//!
//! A record is addressed by its type and key, written `"type/key"`.

use std::fmt;

/// The identity of a record.
///
/// # Invariants
///
/// - Neither `record_type` nor `key` is empty.
/// - `record_type` never contains `/`; `key` may.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    /// The record type, e.g. `note`.
    pub record_type: String,
    /// The key, unique within the type.
    pub key: String,
}

/// Error returned when parsing a `"type/key"` string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordIdError {
    /// No `/` separator was found.
    MissingSeparator(String),
    /// The type or key component is empty.
    EmptyComponent(String),
}

impl fmt::Display for RecordIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator(s) => write!(f, "record id \"{s}\" is not in type/key form"),
            Self::EmptyComponent(s) => {
                write!(f, "record id \"{s}\" has an empty type or key")
            }
        }
    }
}

impl std::error::Error for RecordIdError {}

impl RecordId {
    #[must_use]
    pub fn new(record_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            key: key.into(),
        }
    }

    /// Parse a `"type/key"` string.
    ///
    /// The string is split on the first `/`.
    ///
    /// # Examples
    ///
    /// ```
    /// use record_engine::types::RecordId;
    /// let id = RecordId::parse("note/0").unwrap();
    /// assert_eq!(id.record_type, "note");
    /// assert_eq!(id.key, "0");
    /// ```
    pub fn parse(s: &str) -> Result<Self, RecordIdError> {
        let (record_type, key) = s
            .split_once('/')
            .ok_or_else(|| RecordIdError::MissingSeparator(s.to_owned()))?;
        if record_type.is_empty() || key.is_empty() {
            return Err(RecordIdError::EmptyComponent(s.to_owned()));
        }
        Ok(Self::new(record_type, key))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.record_type, self.key)
    }
}
