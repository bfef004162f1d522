//! Fetch, merge and delta building blocks of the save pipeline.

use crate::acl::{AccessControl, AccessLevel, can_create, record_accessible};
use crate::context::AuthInfo;
use crate::error::EngineError;
use crate::storage::{Storage, StorageError};
use crate::types::{Record, RecordId};

/// Load the stored version of `id`, or confirm that saving it creates a
/// new record.
///
/// Returns `None` for a new record. Unless `elevated`, an existing record
/// needs write access and a new one needs create access on its type.
pub fn fetch_or_create_record(
    storage: &dyn Storage,
    access: &dyn AccessControl,
    id: &RecordId,
    auth: Option<&AuthInfo>,
    elevated: bool,
) -> Result<Option<Record>, EngineError> {
    match storage.get(id) {
        Ok(record) => {
            if !elevated && !record_accessible(&record, auth, AccessLevel::Write) {
                return Err(EngineError::permission_denied(format!(
                    "no permission to modify record {id}"
                )));
            }
            Ok(Some(record))
        }
        Err(StorageError::NotFound(_)) => {
            if !elevated && !can_create(access, &id.record_type, auth) {
                return Err(EngineError::permission_denied(format!(
                    "no permission to create records of type \"{}\"",
                    id.record_type
                )));
            }
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// An independent copy of `record` to serve as the "before" snapshot.
///
/// Transient values are not carried over.
#[must_use]
pub fn copy_record(record: &Record) -> Record {
    let mut copy = record.clone();
    copy.transient.clear();
    copy
}

/// Overlay the ACL (when set) and every field of `src` onto `dst`.
///
/// A payload resets the ACL with `_access: null`, which parses to
/// [`RecordAcl::public`](crate::acl::RecordAcl::public).
///
/// Fields of `dst` missing from `src` are left alone.
pub fn merge_record(dst: &mut Record, src: &Record) {
    if src.acl.is_some() {
        dst.acl.clone_from(&src.acl);
    }
    for (field, value) in &src.data {
        dst.data.insert(field.clone(), value.clone());
    }
}

/// The part of `full` that differs from `base`.
///
/// Identity, owner and timestamps come from `full`; the ACL too, falling
/// back to the one on `base`. A field is included when `base` lacks it or
/// holds a different value.
#[must_use]
pub fn derive_delta_record(base: Option<&Record>, full: &Record) -> Record {
    let mut delta = Record::new(full.id.clone());
    delta.acl = full
        .acl
        .clone()
        .or_else(|| base.and_then(|base| base.acl.clone()));
    delta.owner_id.clone_from(&full.owner_id);
    delta.created_at = full.created_at;
    delta.created_by.clone_from(&full.created_by);
    delta.updated_at = full.updated_at;
    delta.updated_by.clone_from(&full.updated_by);

    for (field, value) in &full.data {
        let unchanged = base
            .and_then(|base| base.data.get(field))
            .is_some_and(|old| old == value);
        if !unchanged {
            delta.data.insert(field.clone(), value.clone());
        }
    }
    delta
}
