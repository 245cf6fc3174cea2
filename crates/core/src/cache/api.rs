//! Local cache of idempotent resolver responses.
//!
//! One JSON record per request signature, stored at
//! `<root>/<aa>/<signature key>.json`. Lookups never touch the network.
//! Volatile responses are refused at `put`, so a volatile response can never
//! be served by a later `get`.

use super::atomic::atomic_write;
use super::hash::shard;
use crate::Error;
use crate::resolver::{ApiCacheRecord, RequestSignature, ResolverResponse};
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Filesystem-backed API-response cache.
#[derive(Debug, Clone)]
pub struct LocalApiCache {
    root: PathBuf,
}

impl LocalApiCache {
    /// Create a cache rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the records.
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, signature: &RequestSignature) -> PathBuf {
        let key = signature.key();
        self.root.join(shard(&key)).join(format!("{key}.json"))
    }

    /// Look up the stored response for `signature`.
    ///
    /// Unreadable or corrupt records are logged and read as absent.
    pub fn get(&self, signature: &RequestSignature) -> Option<ResolverResponse> {
        let path = self.record_path(signature);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read API cache record");
                return None;
            }
        };

        let record: ApiCacheRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt API cache record");
                return None;
            }
        };

        if !record.response.idempotent {
            tracing::warn!(path = %path.display(), "ignoring persisted volatile response");
            return None;
        }

        Some(record.response)
    }

    /// Persist `response` for `signature`.
    ///
    /// Volatile responses are not persisted; the refusal is logged, not
    /// returned as an error.
    ///
    /// # Errors
    ///
    /// `CacheIo` if the record cannot be written.
    pub fn put(&self, signature: &RequestSignature, response: &ResolverResponse) -> Result<(), Error> {
        if !response.idempotent {
            tracing::warn!(
                identifier = signature.identifier(),
                resolver = signature.resolver(),
                "refusing to persist volatile resolver response"
            );
            return Ok(());
        }

        let record = ApiCacheRecord { signature: signature.clone(), response: response.clone(), captured_at: Utc::now() };
        let bytes = serde_json::to_vec_pretty(&record)?;
        atomic_write(&self.record_path(signature), &bytes)?;

        tracing::debug!(identifier = signature.identifier(), resolver = signature.resolver(), "stored API response");
        Ok(())
    }

    pub fn has(&self, signature: &RequestSignature) -> bool {
        self.get(signature).is_some()
    }

    /// Forget the stored response for `signature`. Returns whether a record
    /// was removed.
    pub fn remove(&self, signature: &RequestSignature) -> Result<bool, Error> {
        let path = self.record_path(signature);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::cache_io(format!("failed to remove {}", path.display()), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Identifier;
    use tempfile::TempDir;
    use url::Url;

    fn signature(resolver: &str) -> RequestSignature {
        let id = Identifier::parse("scidd:/astro/file/sdss/dr16/frame-g-006073-1-0025.fits").unwrap();
        RequestSignature::new(resolver, &id)
    }

    fn response() -> ResolverResponse {
        ResolverResponse::idempotent(Url::parse("https://example.org/frame.fits").unwrap())
            .with_size(42)
            .with_content_type("application/fits")
    }

    #[test]
    fn test_put_and_get() {
        let dir = TempDir::new().unwrap();
        let cache = LocalApiCache::new(dir.path());
        let sig = signature("stub");

        assert!(!cache.has(&sig));
        assert_eq!(cache.get(&sig), None);

        cache.put(&sig, &response()).unwrap();
        assert!(cache.has(&sig));
        assert_eq!(cache.get(&sig), Some(response()));
    }

    #[test]
    fn test_get_survives_new_instance() {
        let dir = TempDir::new().unwrap();
        let sig = signature("stub");
        LocalApiCache::new(dir.path()).put(&sig, &response()).unwrap();

        let reopened = LocalApiCache::new(dir.path());
        assert_eq!(reopened.get(&sig), Some(response()));
    }

    #[test]
    fn test_volatile_never_persisted() {
        let dir = TempDir::new().unwrap();
        let cache = LocalApiCache::new(dir.path());
        let sig = signature("stub");
        let volatile = ResolverResponse::volatile(Url::parse("https://example.org/signed?exp=1").unwrap());

        cache.put(&sig, &volatile).unwrap();
        assert_eq!(cache.get(&sig), None);
        assert!(!cache.has(&sig));
        assert!(!dir.path().exists() || std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let cache = LocalApiCache::new(dir.path());
        let sig = signature("stub");
        assert!(!cache.remove(&sig).unwrap());

        cache.put(&sig, &response()).unwrap();
        assert!(cache.remove(&sig).unwrap());
        assert!(!cache.has(&sig));
    }

    #[test]
    fn test_resolvers_do_not_share_records() {
        let dir = TempDir::new().unwrap();
        let cache = LocalApiCache::new(dir.path());
        cache.put(&signature("resolver-a"), &response()).unwrap();
        assert!(!cache.has(&signature("resolver-b")));
    }

    #[test]
    fn test_corrupt_record_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let cache = LocalApiCache::new(dir.path());
        let sig = signature("stub");
        cache.put(&sig, &response()).unwrap();

        let path = cache.record_path(&sig);
        std::fs::write(&path, b"{\"signature\":").unwrap();
        assert_eq!(cache.get(&sig), None);
    }
}
