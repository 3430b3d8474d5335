//! Transaction Hook Scheduler
//!
//! Deferred actions scheduled with `after_commit` run exactly once, after
//! the outermost transaction commits, and never after a rollback.

mod connection;
mod queue;

pub use connection::TxConnection;
pub use queue::{run_deferred, DeferredAction, DeferredQueue};
