//! Storage path derivation
//!
//! Files fan out over two directory levels taken from the SHA-256 of the
//! attachment id. The id prefix on the file name keeps attachments that
//! share a filename apart.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use versions_core_types::RecordId;

/// `<root>/<h0>/<h1>/<id>-<filename>` where `h` is the hex digest of the id
pub fn attachment_path(root: &Path, id: RecordId, filename: &str) -> PathBuf {
    let digest = hex::encode(Sha256::digest(id.to_string().as_bytes()));
    root.join(&digest[0..1])
        .join(&digest[1..2])
        .join(format!("{}-{}", id, filename))
}
