#![allow(dead_code)]

use rusqlite::Connection;
use tempfile::TempDir;
use versions_core::model::{ErrorSet, Record};
use versions_core::policy::VersionPolicy;
use versions_core::Result;
use versions_engine::{HasMultiple, Versioned};
use versions_store::attachments::AttachmentStore;
use versions_store::migrations::apply_migrations;
use versions_store::TxConnection;

pub const SCHEMA: &str = "
    CREATE TABLE pages (
        id INTEGER PRIMARY KEY,
        name TEXT,
        version_id INTEGER,
        created_at INTEGER,
        updated_at INTEGER,
        CHECK (name IS NULL OR name <> 'forbidden')
    );
    CREATE TABLE versions (
        id INTEGER PRIMARY KEY,
        number INTEGER NOT NULL,
        page_id INTEGER,
        node_id INTEGER,
        title TEXT,
        text TEXT,
        attachment_id INTEGER,
        created_at INTEGER,
        updated_at INTEGER,
        CHECK (title IS NULL OR title <> 'constraint-breaker')
    );
";

pub struct Fixture {
    pub dir: TempDir,
    pub tx: TxConnection,
    pub store: AttachmentStore,
}

pub fn setup() -> Fixture {
    let dir = TempDir::new().unwrap();
    let mut conn = Connection::open_in_memory().unwrap();
    apply_migrations(&mut conn).unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    let tx = TxConnection::new(conn);
    let store = AttachmentStore::open(&tx, dir.path().join("attachments")).unwrap();
    Fixture { dir, tx, store }
}

pub fn count(tx: &TxConnection, table: &str) -> i64 {
    tx.connection()
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .unwrap()
}

/// Rejects titles with an `x` at validation and with a `y` right before the
/// write; allows destruction
#[derive(Debug, Clone, Copy, Default)]
pub struct LetterPolicy;

impl VersionPolicy for LetterPolicy {
    fn validate(&self, version: &Record, errors: &mut ErrorSet) {
        if version.get("title").as_str().is_some_and(|t| t.contains('x')) {
            errors.add("title", "should not contain letter x");
        }
    }

    fn before_persist(&self, version: &Record, errors: &mut ErrorSet) {
        if version.get("title").as_str().is_some_and(|t| t.contains('y')) {
            errors.add("title", "should not contain letter y");
        }
    }

    fn can_destroy(&self, _version: &Record, _table: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Updates in place instead of forking
#[derive(Debug, Clone, Copy, Default)]
pub struct InPlacePolicy;

impl VersionPolicy for InPlacePolicy {
    fn should_fork(&self, _version: &Record) -> bool {
        false
    }

    fn can_destroy(&self, _version: &Record, _table: &str) -> Result<bool> {
        Ok(true)
    }
}

pub fn pages(fx: &Fixture) -> HasMultiple<LetterPolicy> {
    HasMultiple::builder("versions")
        .owner_table("pages")
        .policy(LetterPolicy)
        .attachments(fx.store.clone())
        .build(&fx.tx)
        .unwrap()
}

pub fn versions(fx: &Fixture) -> Versioned<LetterPolicy> {
    Versioned::builder("versions")
        .policy(LetterPolicy)
        .attachments(fx.store.clone())
        .build(&fx.tx)
        .unwrap()
}
