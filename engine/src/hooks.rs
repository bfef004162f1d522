//! Hook collaborator.
//!
//! Hooks run synchronously between pipeline stages. Before-phase hooks may
//! change the record about to be written, and an error from one excludes
//! that record from the batch. After-phase hooks run once the write is
//! committed; their errors are logged and never reach the caller.

use std::fmt;

use crate::error::EngineError;
use crate::types::Record;

/// Where in the pipeline a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BeforeSave => "beforeSave",
            Self::AfterSave => "afterSave",
            Self::BeforeDelete => "beforeDelete",
            Self::AfterDelete => "afterDelete",
        };
        f.write_str(name)
    }
}

/// Runs the hooks registered for a phase.
pub trait HookRunner {
    /// Run hooks for `phase` on `record`.
    ///
    /// `original` is the stored version before this request, or `None`
    /// for a new record and for delete phases.
    fn execute_hooks(
        &self,
        phase: HookPhase,
        record: &mut Record,
        original: Option<&Record>,
    ) -> Result<(), EngineError>;
}

/// A hook runner with no hooks registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl HookRunner for NoHooks {
    fn execute_hooks(
        &self,
        _phase: HookPhase,
        _record: &mut Record,
        _original: Option<&Record>,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}
