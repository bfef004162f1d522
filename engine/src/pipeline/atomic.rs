//! Batch orchestration.
//!
//! Non-atomic batches run without a transaction and report per-item
//! failures next to successes. Atomic batches run inside one storage
//! transaction that is rolled back if any item fails.

use serde_json::{Map, json};
use tracing::{error, info, warn};

use crate::error::{EngineError, ErrorKind};
use crate::pipeline::{ItemResult, RecordEngine};
use crate::storage::StorageError;

impl RecordEngine<'_> {
    /// Run `op` over a batch in the requested mode.
    ///
    /// In atomic mode any item failure rolls the whole batch back and
    /// becomes one `AtomicOperationFailure` whose info maps each failing
    /// item to its error. Items without an ID are keyed by position
    /// (`#2`). A request-level error from `op` is returned as is after the
    /// rollback.
    pub(crate) fn execute_batch<T>(
        &mut self,
        atomic: bool,
        op: impl FnOnce(&mut Self) -> Result<Vec<ItemResult<T>>, EngineError>,
    ) -> Result<Vec<ItemResult<T>>, EngineError> {
        if !atomic {
            return op(self);
        }

        self.storage.begin().map_err(transaction_failure)?;

        let items = match op(self) {
            Ok(items) => items,
            Err(e) => {
                self.rollback();
                return Err(e);
            }
        };

        let failures: Map<String, serde_json::Value> = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.as_ref().err().map(|e| (i, e)))
            .map(|(i, e)| {
                let key = e.id.clone().unwrap_or_else(|| format!("#{i}"));
                (key, e.error.to_json())
            })
            .collect();

        if !failures.is_empty() {
            warn!(failed = failures.len(), total = items.len(), "rolling back atomic batch");
            self.rollback();
            return Err(EngineError::new(
                ErrorKind::AtomicOperationFailure,
                "Atomic Operation rolled back due to one or more errors",
            )
            .with_info(failures));
        }

        if let Err(e) = self.storage.commit() {
            self.rollback();
            return Err(transaction_failure(e));
        }
        info!(records = items.len(), "committed atomic batch");
        Ok(items)
    }

    fn rollback(&mut self) {
        if let Err(e) = self.storage.rollback() {
            error!(error = %e, "failed to roll back transaction");
        }
    }
}

fn transaction_failure(e: StorageError) -> EngineError {
    let inner = EngineError::from(e);
    let mut info = Map::new();
    info.insert("inner_error".to_owned(), inner.to_json());
    EngineError::new(
        ErrorKind::AtomicOperationFailure,
        format!("Atomic Operation failed: {}", inner.message()),
    )
    .with_info(info)
}
