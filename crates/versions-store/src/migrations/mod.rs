//! Migration framework
//!
//! Provides:
//! - Migration runner with checksums
//! - Idempotent application
//! - Embedded SQL migrations for the store's own tables

mod checksums;
mod embedded;
mod runner;

pub use embedded::Migration;
pub use runner::{applied_migrations, apply_migration_set, apply_migrations};
