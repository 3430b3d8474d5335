//! Runtime configuration
//!
//! Where the database and the attachment files live.

#![allow(clippy::result_large_err)]

use std::fs;
use std::path::{Path, PathBuf};

use crate::attachments::AttachmentStore;
use crate::db;
use crate::errors::{io_error, Result};
use crate::migrations::{apply_migration_set, apply_migrations, Migration};
use crate::tx::TxConnection;

pub const DEFAULT_DB_PATH: &str = ".versions/store.db";
pub const DEFAULT_ATTACHMENTS_ROOT: &str = ".versions/attachments";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub attachments_root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            attachments_root: PathBuf::from(DEFAULT_ATTACHMENTS_ROOT),
        }
    }
}

impl StoreConfig {
    pub fn new(db_path: impl Into<PathBuf>, attachments_root: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            attachments_root: attachments_root.into(),
        }
    }

    /// Open the database with the store's migrations applied
    pub fn open(&self) -> Result<TxConnection> {
        self.open_with(&[])
    }

    /// Open the database, applying the store's migrations and then the
    /// application's own
    pub fn open_with(&self, app_migrations: &[Migration]) -> Result<TxConnection> {
        ensure_parent(&self.db_path)?;
        fs::create_dir_all(&self.attachments_root)
            .map_err(|e| io_error("create_attachments_root", e))?;

        let mut conn = db::open(&self.db_path)?;
        db::configure(&conn)?;
        apply_migrations(&mut conn)?;
        apply_migration_set(&mut conn, app_migrations)?;

        tracing::debug!(db_path = %self.db_path.display(), "store opened");
        Ok(TxConnection::new(conn))
    }

    pub fn attachment_store(&self, tx: &TxConnection) -> Result<AttachmentStore> {
        AttachmentStore::open(tx, self.attachments_root.clone())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| io_error("create_db_dir", e))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.db_path, PathBuf::from(".versions/store.db"));
        assert_eq!(config.attachments_root, PathBuf::from(".versions/attachments"));
    }

    #[test]
    fn test_open_creates_directories_and_schema() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(
            dir.path().join("nested").join("store.db"),
            dir.path().join("files"),
        );

        let tx = config.open().unwrap();

        assert!(config.attachments_root.is_dir());
        let store = config.attachment_store(&tx).unwrap();
        assert_eq!(store.count(&tx).unwrap(), 0);
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path().join("store.db"), dir.path().join("files"));
        drop(config.open().unwrap());
        assert!(config.open().is_ok());
    }
}
