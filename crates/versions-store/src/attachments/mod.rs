//! Shared Attachment Store
//!
//! Reference-counted file attachments shared between version rows. The
//! physical file operations always go through the connection's deferred
//! action queue.

pub mod atomic;
pub mod filename;
pub mod sharding;
mod store;

pub use sharding::attachment_path;
pub use store::{Attachment, AttachmentStore, Upload, ATTACHMENTS_TABLE, ATTACHMENT_COLUMN};
