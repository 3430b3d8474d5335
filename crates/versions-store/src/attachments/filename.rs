//! Stored filename sanitising

use sha2::{Digest, Sha256};

/// Keep only `[A-Za-z0-9_.-]`
///
/// Names that would be hidden files (leading dot) or end up empty are
/// replaced by a short digest of the current time.
pub fn sanitize_filename(original: &str) -> String {
    let cleaned: String = original
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();

    if cleaned.is_empty() || cleaned.starts_with('.') {
        let seconds = chrono::Utc::now().timestamp();
        let digest = hex::encode(Sha256::digest(seconds.to_string().as_bytes()));
        return digest[..7].to_string();
    }

    cleaned
}
