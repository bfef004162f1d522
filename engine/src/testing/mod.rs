//! Shared test helpers.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Debug;

use serde_json::json;

use crate::error::{EngineError, ErrorKind};
use crate::hooks::{HookPhase, HookRunner};
use crate::types::{Record, RecordId, Value};

/// Assert that `result` failed with `InvalidArgument` naming `argument`.
#[track_caller]
pub fn assert_invalid_argument<T: Debug>(result: Result<T, EngineError>, argument: &str) {
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");
    let arguments = err.info().and_then(|info| info.get("arguments"));
    assert!(
        arguments
            .and_then(|arguments| arguments.as_array())
            .is_some_and(|arguments| arguments.contains(&json!(argument))),
        "expected argument {argument:?} in {arguments:?}"
    );
}

/// One hook invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct HookCall {
    pub phase: HookPhase,
    /// The record as the hook received it.
    pub record: Record,
    pub original: Option<Record>,
}

/// A hook runner that records every call.
///
/// It can reject chosen records in chosen phases and stamp fields onto
/// records in the before-save phase.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    calls: RefCell<Vec<HookCall>>,
    failures: Vec<(HookPhase, RecordId)>,
    before_save_fields: BTreeMap<String, Value>,
}

impl RecordingHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `phase` hook for `id`.
    #[must_use]
    pub fn fail_on(mut self, phase: HookPhase, id: RecordId) -> Self {
        self.failures.push((phase, id));
        self
    }

    /// Set `field` on every record in the before-save phase.
    #[must_use]
    pub fn set_before_save(mut self, field: &str, value: Value) -> Self {
        self.before_save_fields.insert(field.to_owned(), value);
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.borrow().clone()
    }

    /// The phases run for `id`, in order.
    #[must_use]
    pub fn phases_for(&self, id: &RecordId) -> Vec<HookPhase> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| &call.record.id == id)
            .map(|call| call.phase)
            .collect()
    }
}

impl HookRunner for RecordingHooks {
    fn execute_hooks(
        &self,
        phase: HookPhase,
        record: &mut Record,
        original: Option<&Record>,
    ) -> Result<(), EngineError> {
        self.calls.borrow_mut().push(HookCall {
            phase,
            record: record.clone(),
            original: original.cloned(),
        });

        if self
            .failures
            .iter()
            .any(|(failing_phase, id)| *failing_phase == phase && *id == record.id)
        {
            return Err(EngineError::unexpected(format!(
                "{phase} hook rejected {}",
                record.id
            )));
        }

        if phase == HookPhase::BeforeSave {
            for (field, value) in &self.before_save_fields {
                record.data.insert(field.clone(), value.clone());
            }
        }
        Ok(())
    }
}
