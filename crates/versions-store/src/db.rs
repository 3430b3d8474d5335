//! Database connection management
//!
//! Provides utilities for opening and configuring SQLite connections

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use rusqlite::Connection;
use std::path::Path;

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Configure a connection
///
/// Foreign keys are always enforced. WAL is only requested for file-backed
/// databases; in-memory databases keep their default journal.
pub fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(from_rusqlite)?;

    let in_memory = conn.path().map(str::is_empty).unwrap_or(true);
    if !in_memory {
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(from_rusqlite)?;
    }

    Ok(())
}
