//! Attachment rows plus their files
//!
//! Rows are written inside the caller's transaction. The file write after
//! an insert and the file removal after a delete are deferred actions, so a
//! rolled-back transaction never leaves an orphan file and a file is never
//! written before its row is durable.

#![allow(clippy::result_large_err)]

use std::fs;
use std::path::{Path, PathBuf};

use versions_core::model::{Record, Value};
use versions_core_types::RecordId;

use crate::attachments::atomic::{atomic_write, remove_if_exists};
use crate::attachments::filename::sanitize_filename;
use crate::attachments::sharding::attachment_path;
use crate::errors::{io_error, Result};
use crate::table::Table;
use crate::tx::TxConnection;

pub const ATTACHMENTS_TABLE: &str = "attachments";
/// Column linking a version (or any linker) to its attachment
pub const ATTACHMENT_COLUMN: &str = "attachment_id";
const FILENAME_COLUMN: &str = "filename";

/// File content handed in by a caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    original_filename: String,
    bytes: Vec<u8>,
}

impl Upload {
    pub fn new(original_filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            original_filename: original_filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a local file, keeping its file name
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| io_error("read_upload", e))?;
        let original_filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            original_filename,
            bytes,
        })
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// An attachment row, possibly carrying bytes not yet saved
#[derive(Debug, Clone)]
pub struct Attachment {
    record: Record,
    pending: Option<Vec<u8>>,
}

impl Attachment {
    pub fn id(&self) -> Option<RecordId> {
        self.record.id()
    }

    pub fn filename(&self) -> &str {
        self.record.get(FILENAME_COLUMN).as_str().unwrap_or_default()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn is_new_record(&self) -> bool {
        self.record.is_new_record()
    }

    pub fn pending_bytes(&self) -> Option<&[u8]> {
        self.pending.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
    table: Table,
}

impl AttachmentStore {
    /// Bind the store to the `attachments` table and a root directory
    ///
    /// # Errors
    ///
    /// `NotFound` if the table is missing (store migrations not applied),
    /// `MissingColumn` if it has no `filename` column.
    pub fn open(tx: &TxConnection, root: impl Into<PathBuf>) -> Result<Self> {
        let table = Table::load(tx, ATTACHMENTS_TABLE)?;
        table.require_column(FILENAME_COLUMN)?;
        Ok(Self {
            root: root.into(),
            table,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// New unsaved attachment with a sanitised filename
    pub fn build(&self, upload: Upload) -> Attachment {
        let mut record = Record::new();
        record.set(FILENAME_COLUMN, sanitize_filename(&upload.original_filename));
        Attachment {
            record,
            pending: Some(upload.bytes),
        }
    }

    /// Insert the row and schedule the file write for after commit
    ///
    /// Saving an already persisted attachment is a no-op.
    pub fn save(&self, tx: &TxConnection, attachment: &mut Attachment) -> Result<RecordId> {
        if let (Some(id), false) = (attachment.id(), attachment.is_new_record()) {
            return Ok(id);
        }

        tx.transaction(|tx| {
            let id = self.table.insert(tx, &mut attachment.record)?;
            let bytes = attachment.pending.take().unwrap_or_default();
            let path = self.path(id, attachment.filename());
            tx.after_commit(move || {
                atomic_write(&path, &bytes)?;
                tracing::debug!(
                    attachment_id = id.get(),
                    path = %path.display(),
                    "attachment file written"
                );
                Ok(())
            })?;
            Ok(id)
        })
    }

    pub fn find(&self, tx: &TxConnection, id: RecordId) -> Result<Option<Attachment>> {
        Ok(self.table.find(tx, id)?.map(|record| Attachment {
            record,
            pending: None,
        }))
    }

    pub fn path(&self, id: RecordId, filename: &str) -> PathBuf {
        attachment_path(&self.root, id, filename)
    }

    /// Storage path of a saved attachment
    pub fn path_of(&self, attachment: &Attachment) -> Option<PathBuf> {
        attachment
            .id()
            .filter(|_| !attachment.is_new_record())
            .map(|id| self.path(id, attachment.filename()))
    }

    /// Content of an attachment: pending bytes if not yet written, else the file
    pub fn read(&self, attachment: &Attachment) -> Result<Vec<u8>> {
        if let Some(bytes) = attachment.pending_bytes() {
            return Ok(bytes.to_vec());
        }
        match self.path_of(attachment) {
            Some(path) => fs::read(&path).map_err(|e| io_error("read_attachment", e)),
            None => Ok(Vec::new()),
        }
    }

    /// Drop `linker_id`'s reference to an attachment
    ///
    /// Counts the rows of `linker` other than `linker_id` that still point at
    /// the attachment; when none do, the attachment is destroyed. Returns
    /// whether it was destroyed.
    pub fn unlink(
        &self,
        tx: &TxConnection,
        linker: &Table,
        attachment_id: RecordId,
        linker_id: Option<RecordId>,
    ) -> Result<bool> {
        let remaining = linker.count_where(
            tx,
            ATTACHMENT_COLUMN,
            &Value::from(attachment_id),
            linker_id,
        )?;
        tracing::debug!(
            attachment_id = attachment_id.get(),
            remaining,
            "attachment unlinked"
        );
        if remaining == 0 {
            self.destroy(tx, attachment_id)
        } else {
            Ok(false)
        }
    }

    /// Delete the row and schedule the file removal for after commit
    pub fn destroy(&self, tx: &TxConnection, id: RecordId) -> Result<bool> {
        tx.transaction(|tx| {
            let Some(record) = self.table.find(tx, id)? else {
                return Ok(false);
            };
            let filename = record
                .get(FILENAME_COLUMN)
                .as_str()
                .unwrap_or_default()
                .to_string();
            self.table.delete(tx, id)?;
            let path = self.path(id, &filename);
            tx.after_commit(move || {
                let removed = remove_if_exists(&path)?;
                tracing::debug!(attachment_id = id.get(), removed, "attachment file removed");
                Ok(())
            })?;
            Ok(true)
        })
    }

    pub fn count(&self, tx: &TxConnection) -> Result<i64> {
        self.table.count(tx)
    }
}
