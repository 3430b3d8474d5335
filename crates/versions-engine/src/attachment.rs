//! Version-side attachment handling
//!
//! A version points at one attachment row through `attachment_id`. Forks
//! copy the pointer, so the file is shared until a version gets a file of
//! its own.

#![allow(clippy::result_large_err)]

use std::path::PathBuf;

use versions_core::errors::Result;
use versions_core::model::Value;
use versions_store::attachments::{AttachmentStore, Upload, ATTACHMENT_COLUMN};
use versions_store::{Table, TxConnection};

use crate::version::Version;

/// Detach the current file (if any) and stage the new one
pub(crate) fn assign(store: &AttachmentStore, version: &mut Version, upload: Upload) {
    if let Some(current) = version.attachment_id() {
        if !version.is_new_record() && version.attachment.to_unlink.is_none() {
            version.attachment.to_unlink = Some(current);
        }
        version.record.set(ATTACHMENT_COLUMN, Value::Null);
    }
    version.attachment.pending = Some(store.build(upload));
}

/// Runs right before the version row is written
///
/// An in-place update releases the replaced attachment first; then any
/// staged attachment is saved and linked.
pub(crate) fn before_write(
    store: &AttachmentStore,
    table: &Table,
    tx: &TxConnection,
    version: &mut Version,
) -> Result<()> {
    if let Some(old) = version.attachment.to_unlink.take() {
        if !version.is_new_record() {
            store.unlink(tx, table, old, version.id())?;
        }
    }

    if let Some(mut pending) = version.attachment.pending.take() {
        let id = store.save(tx, &mut pending)?;
        version.record.set(ATTACHMENT_COLUMN, Value::from(id));
    }

    Ok(())
}

pub(crate) fn path(
    store: &AttachmentStore,
    tx: &TxConnection,
    version: &Version,
) -> Result<Option<PathBuf>> {
    if version.has_pending_file() {
        return Ok(None);
    }
    let Some(id) = version.attachment_id() else {
        return Ok(None);
    };
    Ok(store.find(tx, id)?.and_then(|a| store.path_of(&a)))
}

pub(crate) fn read(
    store: &AttachmentStore,
    tx: &TxConnection,
    version: &Version,
) -> Result<Option<Vec<u8>>> {
    if let Some(pending) = &version.attachment.pending {
        return store.read(pending).map(Some);
    }
    let Some(id) = version.attachment_id() else {
        return Ok(None);
    };
    match store.find(tx, id)? {
        Some(attachment) => store.read(&attachment).map(Some),
        None => Ok(None),
    }
}
