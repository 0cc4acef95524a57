//! Content hashing.

use sha2::{Digest, Sha256};

/// Returns the lowercase hex SHA-256 digest of `content`.
#[must_use]
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}
