//! Version Clone Engine
//!
//! Every save of a version decides between an ordinary write and a fork:
//! - new rows are inserted with `number = 1` (or one past a seeded counter)
//! - unchanged rows are left alone
//! - changed rows are cloned into a new row numbered one past their
//!   predecessor when the policy says `should_fork`, else updated in place
//!
//! ## Logging Ownership
//!
//! `version_save` and `version_destroy` log their own lifecycle with
//! `log_op_start!` / `log_op_end!` / `log_op_error!`.

#![allow(clippy::result_large_err)]

use std::path::PathBuf;
use std::time::Instant;

use versions_core::errors::{ExError, ExErrorKind, Result};
use versions_core::model::{Attributes, Value};
use versions_core::policy::{DefaultVersionPolicy, VersionPolicy};
use versions_core::{log_op_end, log_op_error, log_op_start};
use versions_core_types::RecordId;
use versions_store::attachments::{AttachmentStore, Upload, ATTACHMENT_COLUMN};
use versions_store::table::{CREATED_AT, UPDATED_AT};
use versions_store::{Table, TxConnection};

use crate::attachment;
use crate::version::{Version, NUMBER_COLUMN};

/// Error key used for failures that belong to no single attribute
pub const BASE: &str = "base";

/// Configures a [`Versioned`] table
#[derive(Debug)]
pub struct VersionedBuilder<P> {
    table: String,
    policy: P,
    attachments: Option<AttachmentStore>,
}

impl<P: VersionPolicy> VersionedBuilder<P> {
    pub fn policy<Q: VersionPolicy>(self, policy: Q) -> VersionedBuilder<Q> {
        VersionedBuilder {
            table: self.table,
            policy,
            attachments: self.attachments,
        }
    }

    /// Store files of this table's rows in `store`
    pub fn attachments(mut self, store: AttachmentStore) -> Self {
        self.attachments = Some(store);
        self
    }

    /// Check the table against the live schema
    ///
    /// # Errors
    ///
    /// `MissingColumn` when the table has no `number` column, or no
    /// `attachment_id` column while an attachment store is configured.
    pub fn build(self, tx: &TxConnection) -> Result<Versioned<P>> {
        let table = Table::load(tx, &self.table)?;
        table.require_column(NUMBER_COLUMN)?;
        if self.attachments.is_some() {
            table.require_column(ATTACHMENT_COLUMN)?;
        }
        Ok(Versioned {
            table,
            policy: self.policy,
            attachments: self.attachments,
        })
    }
}

/// A table whose rows fork on change
#[derive(Debug)]
pub struct Versioned<P = DefaultVersionPolicy> {
    table: Table,
    policy: P,
    attachments: Option<AttachmentStore>,
}

impl Versioned<DefaultVersionPolicy> {
    pub fn builder(table: &str) -> VersionedBuilder<DefaultVersionPolicy> {
        VersionedBuilder {
            table: table.to_string(),
            policy: DefaultVersionPolicy,
            attachments: None,
        }
    }
}

impl<P: VersionPolicy> Versioned<P> {
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn attachments(&self) -> Option<&AttachmentStore> {
        self.attachments.as_ref()
    }

    pub fn new_version(&self) -> Version {
        Version::new()
    }

    pub fn find(&self, tx: &TxConnection, id: RecordId) -> Result<Option<Version>> {
        Ok(self.table.find(tx, id)?.map(Version::from_record))
    }

    pub fn get(&self, tx: &TxConnection, id: RecordId) -> Result<Version> {
        self.table.get(tx, id).map(Version::from_record)
    }

    /// Build and save a version; check `errors()` on the result if the save
    /// was refused
    pub fn create(&self, tx: &TxConnection, attributes: Attributes) -> Result<Version> {
        let mut version = Version::with_attributes(attributes);
        self.save(tx, &mut version)?;
        Ok(version)
    }

    pub fn count(&self, tx: &TxConnection) -> Result<i64> {
        self.table.count(tx)
    }

    /// Validate, then insert, update or fork
    ///
    /// Returns `Ok(false)` with messages in `version.errors()` when
    /// validation, the `before_persist` check or a database constraint
    /// rejects the save. The version is then back in its pre-save state.
    pub fn save(&self, tx: &TxConnection, version: &mut Version) -> Result<bool> {
        self.save_with(tx, version, true)
    }

    /// Save skipping `validate` (the `before_persist` check still runs)
    pub fn save_without_validation(&self, tx: &TxConnection, version: &mut Version) -> Result<bool> {
        self.save_with(tx, version, false)
    }

    fn save_with(&self, tx: &TxConnection, version: &mut Version, validate: bool) -> Result<bool> {
        log_op_start!("version_save", table = self.table.name(), version_id = ?version.id());
        let start = Instant::now();

        let saved = self
            .save_impl(tx, version, validate)
            .map_err(|e| {
                log_op_error!(
                    "version_save",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
                e
            })?;

        log_op_end!(
            "version_save",
            duration_ms = start.elapsed().as_millis() as u64,
            saved = saved,
            cloned = version.was_cloned(),
            version_number = ?version.number()
        );
        Ok(saved)
    }

    fn save_impl(&self, tx: &TxConnection, version: &mut Version, validate: bool) -> Result<bool> {
        version.record.errors_mut().clear();

        if validate {
            let mut errors = version.record.errors().clone();
            self.policy.validate(&version.record, &mut errors);
            if !errors.is_empty() {
                *version.record.errors_mut() = errors;
                return Ok(false);
            }
        }

        let snapshot = version.clone();
        match tx.transaction_if(|tx| self.persist(tx, version)) {
            Ok(true) => {
                version.previous_number = None;
                version.attachment = Default::default();
                Ok(true)
            }
            Ok(false) => {
                version.restore(snapshot);
                Ok(false)
            }
            // rows are committed, only the follow-up work failed
            Err(err) if err.kind().is_after_commit() => {
                version.previous_number = None;
                version.attachment = Default::default();
                Err(err)
            }
            Err(err) => {
                version.restore(snapshot);
                Err(err)
            }
        }
    }

    /// Decide fork-or-update and write the row
    fn persist(&self, tx: &TxConnection, version: &mut Version) -> Result<bool> {
        self.prepare_save_or_clone(version);

        let mut errors = version.record.errors().clone();
        self.policy.before_persist(&version.record, &mut errors);
        if !errors.is_empty() {
            *version.record.errors_mut() = errors;
            return Ok(false);
        }

        if let Some(store) = &self.attachments {
            attachment::before_write(store, &self.table, tx, version)?;
        }

        let written = if version.is_new_record() {
            self.table.insert(tx, &mut version.record).map(|_| ())
        } else {
            self.table.update(tx, &mut version.record).map(|_| ())
        };

        match written {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ExErrorKind::ConstraintViolation => {
                version.record.errors_mut().add(BASE, err.message().to_string());
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn prepare_save_or_clone(&self, version: &mut Version) {
        if version.is_new_record() {
            let number = version.previous_number.map_or(1, |n| n + 1);
            version.record.set(NUMBER_COLUMN, number);
            version.previous_id = None;
        } else if version.is_changed() && self.policy.should_fork(&version.record) {
            let previous_number = version
                .previous_number
                .or_else(|| self.policy.previous_number(&version.record))
                .or_else(|| version.number())
                .unwrap_or(0);

            version.previous_id = version.id();
            version.previous_number = Some(previous_number);
            version.record.mark_new();
            version.record.set(NUMBER_COLUMN, previous_number + 1);
            for column in [CREATED_AT, UPDATED_AT] {
                if self.table.has_column(column) {
                    version.record.write_raw(column, Value::Null);
                }
            }
            // A fork leaves the previous row linked to its file.
            version.attachment.to_unlink = None;
            self.policy.after_fork(&mut version.record);

            tracing::debug!(
                table = self.table.name(),
                previous_id = ?version.previous_id,
                version_number = previous_number + 1,
                "version forked"
            );
        } else {
            version.previous_id = None;
        }
    }

    /// Delete a version after the policy's `can_destroy` agreed
    ///
    /// # Errors
    ///
    /// `MissingOverride` when the policy does not define `can_destroy`.
    pub fn destroy(&self, tx: &TxConnection, version: &mut Version) -> Result<bool> {
        log_op_start!("version_destroy", table = self.table.name(), version_id = ?version.id());
        let start = Instant::now();

        let destroyed = self.destroy_impl(tx, version).map_err(|e| {
            log_op_error!(
                "version_destroy",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "version_destroy",
            duration_ms = start.elapsed().as_millis() as u64,
            destroyed = destroyed
        );
        Ok(destroyed)
    }

    fn destroy_impl(&self, tx: &TxConnection, version: &mut Version) -> Result<bool> {
        version.record.errors_mut().clear();

        let id = match version.id() {
            Some(id) if !version.is_new_record() => id,
            _ => {
                version.record.mark_destroyed();
                return Ok(true);
            }
        };

        if !self.policy.can_destroy(&version.record, self.table.name())? {
            version
                .record
                .errors_mut()
                .add(BASE, "cannot be destroyed");
            return Ok(false);
        }

        let result = tx.transaction(|tx| {
            if let (Some(store), Some(attachment_id)) = (&self.attachments, version.attachment_id()) {
                store.unlink(tx, &self.table, attachment_id, Some(id))?;
            }
            self.table.delete(tx, id)
        });

        match result {
            Ok(_) => {
                version.record.mark_destroyed();
                Ok(true)
            }
            Err(err) if err.kind().is_after_commit() => {
                version.record.mark_destroyed();
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Replace the version's file; takes effect on the next save
    ///
    /// # Errors
    ///
    /// `InvalidInput` when no attachment store is configured.
    pub fn set_file(&self, version: &mut Version, upload: Upload) -> Result<()> {
        let store = self.require_attachments()?;
        attachment::assign(store, version, upload);
        Ok(())
    }

    pub fn file_path(&self, tx: &TxConnection, version: &Version) -> Result<Option<PathBuf>> {
        let store = self.require_attachments()?;
        attachment::path(store, tx, version)
    }

    /// File content, including a file assigned but not yet saved
    pub fn read_file(&self, tx: &TxConnection, version: &Version) -> Result<Option<Vec<u8>>> {
        let store = self.require_attachments()?;
        attachment::read(store, tx, version)
    }

    fn require_attachments(&self) -> Result<&AttachmentStore> {
        self.attachments.as_ref().ok_or_else(|| {
            ExError::new(ExErrorKind::InvalidInput)
                .with_op("attachments")
                .with_table(self.table.name())
                .with_message(format!(
                    "No attachment store configured for table {}",
                    self.table.name()
                ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use versions_core::attrs;

    #[test]
    fn test_build_requires_number_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, title TEXT);")
            .unwrap();
        let tx = TxConnection::new(conn);

        let err = Versioned::builder("notes").build(&tx).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::MissingColumn);
        assert!(err.kind().is_configuration());
        assert!(err.message().contains("Missing 'number' field in table notes"));
    }

    #[test]
    fn test_new_version_starts_at_one() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, number INTEGER, title TEXT);")
            .unwrap();
        let tx = TxConnection::new(conn);
        let notes = Versioned::builder("notes").build(&tx).unwrap();

        let version = notes.create(&tx, attrs! { "title" => "A" }).unwrap();

        assert_eq!(version.number(), Some(1));
        assert!(!version.was_cloned());
        assert!(!version.is_changed());
    }

    #[test]
    fn test_file_operations_need_a_store() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, number INTEGER);")
            .unwrap();
        let tx = TxConnection::new(conn);
        let notes = Versioned::builder("notes").build(&tx).unwrap();

        let mut version = notes.new_version();
        let err = notes
            .set_file(&mut version, Upload::new("a.txt", b"a".to_vec()))
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }
}
