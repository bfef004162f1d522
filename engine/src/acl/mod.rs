//! Access control.
//!
//! Two layers guard records:
//! - Record ACL ([`RecordAcl`]): who may read or write a record instance,
//!   and who may create records of a type.
//! - Field ACL ([`FieldAcl`]): which fields a viewer may read, write,
//!   compare or discover.
//!
//! The engine reads both through the [`AccessControl`] collaborator.

pub mod field;
pub mod record;

use std::collections::HashMap;

pub use field::{FieldAccessMode, FieldAcl, FieldAclEntry, FieldUserRole, WILDCARD};
pub use record::{AccessLevel, AclTarget, RecordAcl, RecordAclEntry, record_accessible};

use crate::context::AuthInfo;

/// Source of access-control configuration.
pub trait AccessControl {
    /// The creation ACL of a record type. `None` means unrestricted.
    fn record_access(&self, record_type: &str) -> Option<&RecordAcl>;

    /// The ACL given to new records of a type saved without `_access`.
    /// `None` leaves the record's ACL unset (public).
    fn default_record_access(&self, record_type: &str) -> Option<&RecordAcl>;

    /// The field ACL grid.
    fn field_access(&self) -> &FieldAcl;
}

/// Whether `auth` may create records of `record_type`.
#[must_use]
pub fn can_create(access: &dyn AccessControl, record_type: &str, auth: Option<&AuthInfo>) -> bool {
    access
        .record_access(record_type)
        .is_none_or(|acl| acl.accessible(auth, AccessLevel::Create))
}

/// In-memory access-control configuration.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    creation_access: HashMap<String, RecordAcl>,
    default_access: HashMap<String, RecordAcl>,
    field_acl: FieldAcl,
}

impl AccessPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict creation of `record_type` to the `Create` entries of `acl`.
    pub fn set_creation_access(&mut self, record_type: impl Into<String>, acl: RecordAcl) {
        self.creation_access.insert(record_type.into(), acl);
    }

    pub fn set_default_access(&mut self, record_type: impl Into<String>, acl: RecordAcl) {
        self.default_access.insert(record_type.into(), acl);
    }

    pub fn set_field_acl(&mut self, field_acl: FieldAcl) {
        self.field_acl = field_acl;
    }
}

impl AccessControl for AccessPolicy {
    fn record_access(&self, record_type: &str) -> Option<&RecordAcl> {
        self.creation_access.get(record_type)
    }

    fn default_record_access(&self, record_type: &str) -> Option<&RecordAcl> {
        self.default_access.get(record_type)
    }

    fn field_access(&self) -> &FieldAcl {
        &self.field_acl
    }
}
