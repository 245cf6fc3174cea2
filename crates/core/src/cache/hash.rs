//! Cache key generation.

use crate::Identifier;
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;

/// Compute the artifact cache key for an identifier resolved by `resolver_identity`.
pub fn compute_cache_key(identifier: &Identifier, resolver_identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(resolver_identity.as_bytes());
    hasher.update(b"\n");
    hasher.update(identifier.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// Two-character shard directory for a hex key.
pub fn shard(key: &str) -> &str {
    key.get(..2).unwrap_or("__")
}

/// SHA-256 of a file's contents, hex encoded.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
