//! Record-level access control.
//!
//! A record ACL is an ordered list of entries, each granting an
//! [`AccessLevel`] to the public, a role, or a specific user. The record
//! owner always has full access.
//!
//! # Invariants
//!
//! - An unset ACL (`None` on the record) grants everyone access.
//! - An empty ACL grants nobody but the owner access.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::context::AuthInfo;
use crate::types::{JsonDeserializable, JsonSerializable, Record};

/// Permission level granted by an ACL entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
    /// Creation of new records of a type; only meaningful in a type's
    /// creation ACL.
    Create,
}

impl AccessLevel {
    /// Whether holding `self` satisfies a `required` level.
    ///
    /// `Write` implies `Read`; `Create` stands alone.
    #[must_use]
    pub const fn grants(self, required: Self) -> bool {
        matches!(
            (self, required),
            (Self::Read, Self::Read)
                | (Self::Write, Self::Read | Self::Write)
                | (Self::Create, Self::Create)
        )
    }
}

/// Who an ACL entry applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclTarget {
    /// Everyone, authenticated or not.
    Public,
    /// Users holding the role.
    Role(String),
    /// One specific user.
    User(String),
}

impl AclTarget {
    fn matches(&self, auth: Option<&AuthInfo>) -> bool {
        match self {
            Self::Public => true,
            Self::Role(role) => auth.is_some_and(|auth| auth.has_role(role)),
            Self::User(user_id) => auth.is_some_and(|auth| &auth.user_id == user_id),
        }
    }
}

/// A single record ACL entry.
///
/// On the wire: `{"public": true, "level": "read"}`,
/// `{"role": "admin", "level": "write"}` or
/// `{"user_id": "u1", "level": "read"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAclEntry", into = "RawAclEntry")]
pub struct RecordAclEntry {
    pub target: AclTarget,
    pub level: AccessLevel,
}

impl RecordAclEntry {
    #[must_use]
    pub const fn public(level: AccessLevel) -> Self {
        Self {
            target: AclTarget::Public,
            level,
        }
    }

    #[must_use]
    pub fn role(role: impl Into<String>, level: AccessLevel) -> Self {
        Self {
            target: AclTarget::Role(role.into()),
            level,
        }
    }

    #[must_use]
    pub fn user(user_id: impl Into<String>, level: AccessLevel) -> Self {
        Self {
            target: AclTarget::User(user_id.into()),
            level,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawAclEntry {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    level: AccessLevel,
}

impl TryFrom<RawAclEntry> for RecordAclEntry {
    type Error = String;

    fn try_from(raw: RawAclEntry) -> Result<Self, Self::Error> {
        let target = match (raw.public, raw.role, raw.user_id) {
            (true, None, None) => AclTarget::Public,
            (false, Some(role), None) => AclTarget::Role(role),
            (false, None, Some(user_id)) => AclTarget::User(user_id),
            _ => {
                return Err(
                    "ACL entry must name exactly one of public, role or user_id".to_owned(),
                );
            }
        };
        Ok(Self {
            target,
            level: raw.level,
        })
    }
}

impl From<RecordAclEntry> for RawAclEntry {
    fn from(entry: RecordAclEntry) -> Self {
        let mut raw = Self {
            public: false,
            role: None,
            user_id: None,
            level: entry.level,
        };
        match entry.target {
            AclTarget::Public => raw.public = true,
            AclTarget::Role(role) => raw.role = Some(role),
            AclTarget::User(user_id) => raw.user_id = Some(user_id),
        }
        raw
    }
}

/// An ordered list of record ACL entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordAcl(pub Vec<RecordAclEntry>);

impl RecordAcl {
    #[must_use]
    pub const fn new(entries: Vec<RecordAclEntry>) -> Self {
        Self(entries)
    }

    /// Everyone may read and write. Grants the same as an unset ACL, but
    /// survives a delta write, where an unset ACL means "keep".
    #[must_use]
    pub fn public() -> Self {
        Self(vec![RecordAclEntry::public(AccessLevel::Write)])
    }

    /// Whether any entry grants `auth` the `required` level.
    #[must_use]
    pub fn accessible(&self, auth: Option<&AuthInfo>, required: AccessLevel) -> bool {
        self.0
            .iter()
            .any(|entry| entry.level.grants(required) && entry.target.matches(auth))
    }
}

impl JsonDeserializable<&JsonValue> for RecordAcl {
    fn from_json(json_obj: &JsonValue) -> Result<Self, String> {
        Self::deserialize(json_obj).map_err(|e| format!("invalid _access: {e}"))
    }
}

impl JsonSerializable<JsonValue> for RecordAcl {
    fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

/// Whether `auth` may access `record` at the `required` level.
///
/// The owner always may; an unset ACL lets everyone in.
#[must_use]
pub fn record_accessible(record: &Record, auth: Option<&AuthInfo>, required: AccessLevel) -> bool {
    if auth.is_some_and(|auth| !record.owner_id.is_empty() && auth.user_id == record.owner_id) {
        return true;
    }
    record
        .acl
        .as_ref()
        .is_none_or(|acl| acl.accessible(auth, required))
}
