//! Artifact cache entries.
//!
//! A [`CacheEntry`] records what was placed at an artifact path: size,
//! checksum and provenance. Entries are written once, after a successful
//! placement, and used to detect a cached file that was later truncated or
//! modified.

use super::atomic::atomic_write;
use super::hash::{sha256_file, shard};
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metadata about one downloaded artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheEntry {
    /// Artifact cache key (see [`super::hash::compute_cache_key`]).
    pub key: String,
    /// Normalized identifier the artifact was downloaded for.
    pub identifier: String,
    /// Identity of the resolver that located it.
    pub resolver: String,
    /// Path relative to the cache root.
    pub path: PathBuf,
    pub size: u64,
    /// SHA-256 of the file contents, hex encoded.
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// Result of checking a cached file against its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid,
    SizeMismatch,
    ChecksumMismatch,
}

impl CacheEntry {
    /// Compare `file` against the recorded size and, if `deep`, the checksum.
    pub fn verify(&self, file: &Path, deep: bool) -> Result<Verification, Error> {
        let metadata =
            std::fs::metadata(file).map_err(|e| Error::cache_io(format!("failed to stat {}", file.display()), e))?;
        if metadata.len() != self.size {
            return Ok(Verification::SizeMismatch);
        }
        if deep {
            let actual =
                sha256_file(file).map_err(|e| Error::cache_io(format!("failed to hash {}", file.display()), e))?;
            if !actual.eq_ignore_ascii_case(&self.checksum) {
                return Ok(Verification::ChecksumMismatch);
            }
        }
        Ok(Verification::Valid)
    }
}

fn entry_path(entries_dir: &Path, key: &str) -> PathBuf {
    entries_dir.join(shard(key)).join(format!("{key}.json"))
}

/// Load the entry for `key`. Missing or unreadable records read as absent.
pub fn load_entry(entries_dir: &Path, key: &str) -> Option<CacheEntry> {
    let path = entry_path(entries_dir, key);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read cache entry");
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt cache entry");
            None
        }
    }
}

/// Persist an entry atomically, replacing any previous record for its key.
pub fn store_entry(entries_dir: &Path, entry: &CacheEntry) -> Result<(), Error> {
    let bytes = serde_json::to_vec_pretty(entry)?;
    atomic_write(&entry_path(entries_dir, &entry.key), &bytes)
}
