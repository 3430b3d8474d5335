//! Deferred-action queue
//!
//! One queue per connection. Nested transaction levels only remember where
//! their actions start so a rolled-back level can drop exactly its own.

#![allow(clippy::result_large_err)]

use crate::errors::Result;
use versions_core::errors::{ExError, ExErrorKind};

/// A callback run once after the outermost commit
pub type DeferredAction = Box<dyn FnOnce() -> Result<()>>;

#[derive(Default)]
pub struct DeferredQueue {
    actions: Vec<DeferredAction>,
    marks: Vec<usize>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: DeferredAction) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Remember the start of a nested level
    pub fn mark(&mut self) {
        self.marks.push(self.actions.len());
    }

    /// Nested level released: its actions now belong to the enclosing level
    pub fn release_mark(&mut self) {
        self.marks.pop();
    }

    /// Nested level rolled back: drop the actions it scheduled
    pub fn rollback_to_mark(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.actions.truncate(mark);
        }
    }

    /// Swap the queue for an empty one, returning the captured actions
    pub fn take(&mut self) -> Vec<DeferredAction> {
        self.marks.clear();
        std::mem::take(&mut self.actions)
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.marks.clear();
    }
}

impl std::fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("actions", &self.actions.len())
            .field("marks", &self.marks)
            .finish()
    }
}

/// Run actions in scheduling order
///
/// Every action runs even if an earlier one fails; the failures are folded
/// into one `DeferredActionFailed` error.
pub fn run_deferred(actions: Vec<DeferredAction>) -> Result<()> {
    let total = actions.len();
    let mut failures: Vec<ExError> = Vec::new();

    for action in actions {
        if let Err(err) = action() {
            tracing::warn!(err_code = err.code(), error = %err, "deferred action failed");
            failures.push(err);
        }
    }

    tracing::debug!(total, failed = failures.len(), "deferred actions flushed");

    if failures.is_empty() {
        return Ok(());
    }

    let message = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    let mut err = ExError::new(ExErrorKind::DeferredActionFailed)
        .with_op("after_commit")
        .with_message(format!(
            "{} of {} deferred actions failed: {}",
            failures.len(),
            total,
            message
        ));
    if let Some(first) = failures.into_iter().next() {
        err = err.with_source(first);
    }
    Err(err)
}
