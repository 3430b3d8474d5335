//! Versions Store - the storage layer under the versioning engine
//!
//! Provides:
//! - SQLite connection setup and embedded migrations with checksums
//! - `TxConnection`: transaction nesting plus the post-commit action queue
//! - `Table`: a generic, change-aware row gateway
//! - Lineage high-water marks for version numbering
//! - `AttachmentStore`: shared, reference-counted file attachments

pub mod attachments;
pub mod config;
pub mod db;
pub mod errors;
pub mod lineage;
pub mod migrations;
pub mod schema;
pub mod sql_value;
pub mod table;
pub mod tx;

pub use attachments::{Attachment, AttachmentStore, Upload};
pub use config::StoreConfig;
pub use errors::Result;
pub use table::{Order, Table};
pub use tx::TxConnection;
