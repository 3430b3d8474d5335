//! Transactional connection wrapper
//!
//! `TxConnection` owns the SQLite connection together with its deferred
//! action queue and the transaction depth. The outermost level maps to
//! `BEGIN`/`COMMIT`/`ROLLBACK`, nested levels to savepoints.

#![allow(clippy::result_large_err)]

use std::cell::{Cell, RefCell};

use rusqlite::Connection;
use versions_core::errors::VersionsError;

use crate::errors::{from_rusqlite, Result};
use crate::tx::queue::{run_deferred, DeferredQueue};

pub struct TxConnection {
    conn: Connection,
    depth: Cell<u32>,
    queue: RefCell<DeferredQueue>,
}

impl TxConnection {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            depth: Cell::new(0),
            queue: RefCell::new(DeferredQueue::new()),
        }
    }

    /// Underlying connection, for reads and statements issued by gateways
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Mutable access for schema work (migrations) outside any transaction
    ///
    /// # Errors
    ///
    /// `TransactionState` while a transaction is open.
    pub fn connection_mut(&mut self) -> Result<&mut Connection> {
        if self.depth.get() > 0 {
            return Err(VersionsError::TransactionOpen {
                action: "migrate".to_string(),
            }
            .into());
        }
        Ok(&mut self.conn)
    }

    pub fn into_inner(self) -> Connection {
        self.conn
    }

    /// Current nesting depth (0 = no transaction)
    pub fn open_transactions(&self) -> u32 {
        self.depth.get()
    }

    pub fn pending_actions(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn begin(&self) -> Result<()> {
        let depth = self.depth.get();
        if depth == 0 {
            self.conn.execute_batch("BEGIN").map_err(from_rusqlite)?;
        } else {
            self.conn
                .execute_batch(&format!("SAVEPOINT {}", savepoint_name(depth)))
                .map_err(from_rusqlite)?;
            self.queue.borrow_mut().mark();
        }
        self.depth.set(depth + 1);
        tracing::trace!(tx_depth = depth + 1, "transaction begun");
        Ok(())
    }

    /// Commit the innermost level
    ///
    /// Committing the outermost level flushes the deferred queue after the
    /// physical commit succeeded. A flush failure is reported as
    /// `DeferredActionFailed`; the data stays committed.
    pub fn commit(&self) -> Result<()> {
        match self.depth.get() {
            0 => Err(VersionsError::NoTransactionToEnd {
                action: "commit".to_string(),
            }
            .into()),
            1 => {
                if let Err(err) = self.conn.execute_batch("COMMIT") {
                    if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                        tracing::warn!(
                            error = %rollback_err,
                            "rollback after failed commit failed"
                        );
                    }
                    self.depth.set(0);
                    self.on_transaction_end();
                    return Err(from_rusqlite(err));
                }
                self.depth.set(0);
                let result = self.on_commit();
                self.on_transaction_end();
                result
            }
            depth => {
                self.conn
                    .execute_batch(&format!("RELEASE {}", savepoint_name(depth - 1)))
                    .map_err(from_rusqlite)?;
                self.queue.borrow_mut().release_mark();
                self.depth.set(depth - 1);
                Ok(())
            }
        }
    }

    /// Roll back the innermost level, dropping the actions it scheduled
    pub fn rollback(&self) -> Result<()> {
        match self.depth.get() {
            0 => Err(VersionsError::NoTransactionToEnd {
                action: "rollback".to_string(),
            }
            .into()),
            1 => {
                let result = self.conn.execute_batch("ROLLBACK").map_err(from_rusqlite);
                self.depth.set(0);
                self.on_transaction_end();
                result
            }
            depth => {
                let name = savepoint_name(depth - 1);
                self.conn
                    .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name};"))
                    .map_err(from_rusqlite)?;
                self.queue.borrow_mut().rollback_to_mark();
                self.depth.set(depth - 1);
                Ok(())
            }
        }
    }

    /// Schedule an action to run once the outermost transaction commits
    ///
    /// # Errors
    ///
    /// `NoActiveTransaction` when called outside a transaction.
    pub fn after_commit<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        if self.depth.get() == 0 {
            return Err(VersionsError::NoActiveTransaction.into());
        }
        self.queue.borrow_mut().push(Box::new(action));
        Ok(())
    }

    /// Run `f` in a transaction level: commit on `Ok`, roll back on `Err`
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                self.rollback_after_failure();
                Err(err)
            }
        }
    }

    /// Run `f` in a transaction level: commit on `Ok(true)`, roll back on
    /// `Ok(false)` or `Err`
    pub fn transaction_if<F>(&self, f: F) -> Result<bool>
    where
        F: FnOnce(&Self) -> Result<bool>,
    {
        self.begin()?;
        match f(self) {
            Ok(true) => {
                self.commit()?;
                Ok(true)
            }
            Ok(false) => {
                self.rollback()?;
                Ok(false)
            }
            Err(err) => {
                self.rollback_after_failure();
                Err(err)
            }
        }
    }

    fn rollback_after_failure(&self) {
        if let Err(err) = self.rollback() {
            tracing::warn!(err_code = err.code(), error = %err, "rollback failed");
        }
    }

    fn on_commit(&self) -> Result<()> {
        let actions = self.queue.borrow_mut().take();
        if actions.is_empty() {
            return Ok(());
        }
        tracing::debug!(deferred_count = actions.len(), "flushing deferred actions");
        run_deferred(actions)
    }

    fn on_transaction_end(&self) {
        self.queue.borrow_mut().clear();
    }
}

impl std::fmt::Debug for TxConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxConnection")
            .field("depth", &self.depth.get())
            .field("queue", &self.queue.borrow())
            .finish()
    }
}

fn savepoint_name(level: u32) -> String {
    format!("versions_sp_{}", level)
}
