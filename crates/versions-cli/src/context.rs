//! Shared command setup: global flags, the opened store and the document
//! relation

use std::path::PathBuf;

use clap::Args;
use versions_core::model::{ErrorSet, Record};
use versions_core::policy::VersionPolicy;
use versions_core_types::RecordId;
use versions_engine::{HasMultiple, Owner};
use versions_store::config::{DEFAULT_ATTACHMENTS_ROOT, DEFAULT_DB_PATH};
use versions_store::migrations::Migration;
use versions_store::{StoreConfig, TxConnection};

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

pub const DOCUMENTS_TABLE: &str = "documents";
pub const DOCUMENT_VERSIONS_TABLE: &str = "document_versions";

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// SQLite database file
    #[arg(long, global = true, env = "VERSIONS_DB", default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Directory holding attachment files
    #[arg(
        long,
        global = true,
        env = "VERSIONS_ATTACHMENTS",
        default_value = DEFAULT_ATTACHMENTS_ROOT
    )]
    pub attachments: PathBuf,
}

pub fn document_migrations() -> Vec<Migration> {
    vec![Migration {
        id: "cli_001_documents",
        sql: include_str!("../schema/001_documents.sql"),
    }]
}

/// Document versions need a title and may always be destroyed
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentPolicy;

impl VersionPolicy for DocumentPolicy {
    fn validate(&self, version: &Record, errors: &mut ErrorSet) {
        let blank = version
            .get("title")
            .as_str()
            .map_or(true, |t| t.trim().is_empty());
        if blank {
            errors.add("title", "can't be blank");
        }
    }

    fn can_destroy(&self, _version: &Record, _table: &str) -> versions_core::Result<bool> {
        Ok(true)
    }
}

pub struct Context {
    pub config: StoreConfig,
    pub tx: TxConnection,
    pub documents: HasMultiple<DocumentPolicy>,
}

impl Context {
    /// Open (creating if needed) the store and declare the document relation
    pub fn open(args: &GlobalArgs) -> CliResult<Self> {
        let config = StoreConfig::new(args.db.clone(), args.attachments.clone());
        let tx = config.open_with(&document_migrations())?;
        let store = config.attachment_store(&tx)?;
        let documents = HasMultiple::builder(DOCUMENT_VERSIONS_TABLE)
            .owner_table(DOCUMENTS_TABLE)
            .policy(DocumentPolicy)
            .attachments(store)
            .build(&tx)?;

        Ok(Self {
            config,
            tx,
            documents,
        })
    }

    pub fn document(&self, id: i64) -> CliResult<Owner> {
        Ok(self.documents.get(&self.tx, RecordId::new(id))?)
    }
}

/// Turn a refused save or destroy into a command error
pub fn refused(action: &str, errors: &ErrorSet) -> Box<dyn std::error::Error> {
    format!("document was not {}: {}", action, errors.full_messages().join("; ")).into()
}
