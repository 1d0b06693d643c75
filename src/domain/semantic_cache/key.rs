//! Store key derivation

use sha2::{Digest, Sha256};

/// Length of derived keys in hex characters
pub const CACHE_KEY_LENGTH: usize = 16;

/// Derive the store key for a query within a namespace.
///
/// Keys index the store only; similarity search never looks at them.
pub fn derive_cache_key(namespace: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(query.as_bytes());

    let mut key = hex::encode(hasher.finalize());
    key.truncate(CACHE_KEY_LENGTH);
    key
}
