//! Field-level access control.
//!
//! A field ACL is a grid of entries over `(record type, field, user role)`,
//! each saying whether the field is readable, writable, comparable (usable
//! in non-equality predicates and sorts) and discoverable (usable in
//! equality lookups). `*` matches any type or any field.
//!
//! Entries are consulted from most to least specific:
//! `(type, field)`, `(type, *)`, `(*, field)`, `(*, *)`. Within one
//! specificity the configured order is kept. The first entry whose user
//! role matches the viewer decides. When nothing matches, access is
//! granted.

use std::fmt;

use crate::context::AuthInfo;

/// Matches any record type or any field.
pub const WILDCARD: &str = "*";

/// The kind of access a field is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccessMode {
    Readable,
    Writable,
    Comparable,
    Discoverable,
    /// Satisfied by either discoverable or comparable access.
    DiscoverableOrComparable,
}

impl fmt::Display for FieldAccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Readable => "readable",
            Self::Writable => "writable",
            Self::Comparable => "comparable",
            Self::Discoverable => "discoverable",
            Self::DiscoverableOrComparable => "discoverable or comparable",
        };
        f.write_str(name)
    }
}

/// Who a field ACL entry applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUserRole {
    /// The owner of the record being accessed. Never matches when no
    /// record is at hand, e.g. while checking a query.
    Owner,
    SpecificUser(String),
    Role(String),
    /// Any authenticated user.
    AnyUser,
    /// Everyone.
    Public,
}

impl FieldUserRole {
    fn matches(&self, auth: Option<&AuthInfo>, owner_id: Option<&str>) -> bool {
        match self {
            Self::Public => true,
            Self::AnyUser => auth.is_some(),
            Self::Owner => match (auth, owner_id) {
                (Some(auth), Some(owner_id)) => auth.user_id == owner_id,
                _ => false,
            },
            Self::SpecificUser(user_id) => auth.is_some_and(|auth| &auth.user_id == user_id),
            Self::Role(role) => auth.is_some_and(|auth| auth.has_role(role)),
        }
    }
}

/// A single field ACL entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAclEntry {
    pub record_type: String,
    pub record_field: String,
    pub user_role: FieldUserRole,
    pub readable: bool,
    pub writable: bool,
    pub comparable: bool,
    pub discoverable: bool,
}

impl FieldAclEntry {
    /// Create an entry granting every kind of access.
    #[must_use]
    pub fn new(
        record_type: impl Into<String>,
        record_field: impl Into<String>,
        user_role: FieldUserRole,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            record_field: record_field.into(),
            user_role,
            readable: true,
            writable: true,
            comparable: true,
            discoverable: true,
        }
    }

    /// Withdraw one kind of access.
    ///
    /// `DiscoverableOrComparable` withdraws both.
    #[must_use]
    pub const fn deny(mut self, mode: FieldAccessMode) -> Self {
        match mode {
            FieldAccessMode::Readable => self.readable = false,
            FieldAccessMode::Writable => self.writable = false,
            FieldAccessMode::Comparable => self.comparable = false,
            FieldAccessMode::Discoverable => self.discoverable = false,
            FieldAccessMode::DiscoverableOrComparable => {
                self.discoverable = false;
                self.comparable = false;
            }
        }
        self
    }

    #[must_use]
    pub const fn allows(&self, mode: FieldAccessMode) -> bool {
        match mode {
            FieldAccessMode::Readable => self.readable,
            FieldAccessMode::Writable => self.writable,
            FieldAccessMode::Comparable => self.comparable,
            FieldAccessMode::Discoverable => self.discoverable,
            FieldAccessMode::DiscoverableOrComparable => self.discoverable || self.comparable,
        }
    }

    fn applies_to(&self, record_type: &str, field: &str) -> bool {
        (self.record_type == WILDCARD || self.record_type == record_type)
            && (self.record_field == WILDCARD || self.record_field == field)
    }

    /// Lower is more specific.
    fn specificity(&self) -> u8 {
        match (self.record_type == WILDCARD, self.record_field == WILDCARD) {
            (false, false) => 0,
            (false, true) => 1,
            (true, false) => 2,
            (true, true) => 3,
        }
    }
}

/// The field ACL grid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldAcl {
    /// Sorted by specificity, stable within one specificity.
    entries: Vec<FieldAclEntry>,
}

impl FieldAcl {
    #[must_use]
    pub fn new(mut entries: Vec<FieldAclEntry>) -> Self {
        entries.sort_by_key(FieldAclEntry::specificity);
        Self { entries }
    }

    /// Whether `auth` has `mode` access to `field` of `record_type`.
    ///
    /// `owner_id` is the owner of the record being accessed, if any; it
    /// lets `Owner` entries match.
    #[must_use]
    pub fn accessible(
        &self,
        record_type: &str,
        field: &str,
        mode: FieldAccessMode,
        auth: Option<&AuthInfo>,
        owner_id: Option<&str>,
    ) -> bool {
        self.entries
            .iter()
            .filter(|entry| entry.applies_to(record_type, field))
            .find(|entry| entry.user_role.matches(auth, owner_id))
            .is_none_or(|entry| entry.allows(mode))
    }
}
