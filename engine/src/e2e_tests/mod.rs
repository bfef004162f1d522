//! End-to-end tests at the JSON request/response level.
//!
//! Each test file covers a specific scenario, driving the engine through
//! the same payloads a caller would send.

#![cfg(test)]

mod helpers;

mod test_atomic_save;
mod test_delete;
mod test_eager_load;
mod test_fetch;
mod test_hooks;
mod test_query_field_acl;
mod test_save_merge;
mod test_save_new_record;
mod test_schema_conflict;
