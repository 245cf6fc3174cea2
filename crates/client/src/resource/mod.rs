//! Local file access for identifiers.
//!
//! [`FileResource`] combines a resolver, a cache manager and a downloader.
//! `local_path` walks the artifact state machine:
//!
//! 1. compute the artifact path; if the file is there (and matches its
//!    recorded entry) return it without touching the network
//! 2. otherwise ask the resolver for a URL (API-cache aware)
//! 3. stream the bytes into the staging directory, verify them, and move
//!    them into place with a single rename
//!
//! A failure at any step leaves the final path as it was.

use crate::fetch::Downloader;
use chrono::Utc;
use scidd_core::cache::{
    CacheEntry, CacheManager, Placement, Verification, compute_cache_key, conforms_to_interface,
    default_cache_manager, place_staged,
};
use scidd_core::resolver::{Resolver, ResolverResponse, validate_resolver_identity};
use scidd_core::{Error, Identifier};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Facade resolving identifiers to files in the local cache.
pub struct FileResource {
    resolver: Arc<dyn Resolver>,
    cache: Arc<dyn CacheManager>,
    downloader: Downloader,
    verify_checksums: bool,
}

impl FileResource {
    /// Register a resolver and cache manager.
    ///
    /// # Errors
    ///
    /// `Interface` if the cache manager fails the conformance check,
    /// `InvalidInput` if the resolver identity is unusable.
    pub fn new(
        resolver: Arc<dyn Resolver>, cache: Arc<dyn CacheManager>, downloader: Downloader,
    ) -> Result<Self, Error> {
        validate_resolver_identity(resolver.identity())?;
        conforms_to_interface(cache.as_ref())?;
        Ok(Self { resolver, cache, downloader, verify_checksums: true })
    }

    /// Like [`FileResource::new`] with the process-wide cache manager.
    pub fn with_default_cache(resolver: Arc<dyn Resolver>, downloader: Downloader) -> Result<Self, Error> {
        Self::new(resolver, default_cache_manager(), downloader)
    }

    /// Whether cached files are re-hashed against their recorded checksum.
    /// When off, only the recorded size is compared.
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    pub fn cache(&self) -> &Arc<dyn CacheManager> {
        &self.cache
    }

    /// Resolve any identifier, including searches. Uses the API cache.
    pub async fn resolve(&self, identifier: &Identifier) -> Result<ResolverResponse, Error> {
        self.resolver.resolve(identifier, self.cache.as_ref()).await
    }

    /// Where the artifact for `identifier` lives (or would live) in the cache.
    ///
    /// Fragments select data inside an artifact, so they are ignored here.
    pub fn cached_path(&self, identifier: &Identifier) -> Result<PathBuf, Error> {
        let artifact = identifier.without_fragment();
        if !artifact.resource_type().is_artifact() {
            return Err(Error::NotAnArtifact(format!("{identifier} does not name a single artifact")));
        }
        self.cache.artifact_path(&artifact, self.resolver.identity())
    }

    /// Whether the artifact is already cached. A single `stat`, no network.
    pub fn exists_in_cache(&self, identifier: &Identifier) -> Result<bool, Error> {
        Ok(self.cached_path(identifier)?.is_file())
    }

    /// Local path of the artifact for `identifier`, downloading it on a miss.
    ///
    /// Repeat calls for a cached artifact perform no network access.
    ///
    /// # Errors
    ///
    /// `NotAnArtifact` for search identifiers; resolver errors unchanged;
    /// `NotFound`/`Resolution`/`TooLarge` from the download;
    /// `ChecksumMismatch` when the bytes disagree with the resolver;
    /// `CacheIo` for local failures.
    pub async fn local_path(&self, identifier: &Identifier) -> Result<PathBuf, Error> {
        let artifact = identifier.without_fragment();
        let dest = self.cached_path(&artifact)?;
        let identity = self.resolver.identity();

        let state = {
            let cache = Arc::clone(&self.cache);
            let (artifact, identity, dest) = (artifact.clone(), identity.to_string(), dest.clone());
            let deep = self.verify_checksums;
            tokio::task::spawn_blocking(move || inspect(cache.as_ref(), &artifact, &identity, &dest, deep))
                .await
                .map_err(|e| Error::cache_io("cache lookup task failed", std::io::Error::other(e)))??
        };

        let replace = match state {
            CachedState::Hit { verified } => {
                tracing::debug!(identifier = %artifact, path = %dest.display(), verified, "cache hit");
                return Ok(dest);
            }
            CachedState::Miss => {
                tracing::debug!(identifier = %artifact, "cache miss");
                false
            }
            CachedState::Stale(mismatch) => {
                tracing::warn!(
                    identifier = %artifact,
                    path = %dest.display(),
                    reason = ?mismatch,
                    "cached artifact does not match its entry, downloading again"
                );
                true
            }
        };

        let response = self.resolve(&artifact).await?;
        let staged = self.downloader.download(&response.url, &self.cache.staging_dir()).await?;

        if let Some(expected) = &response.checksum
            && !expected.eq_ignore_ascii_case(&staged.checksum)
        {
            self.forget_response(&artifact);
            return Err(Error::ChecksumMismatch { expected: expected.clone(), actual: staged.checksum });
        }
        if let Some(expected) = response.size
            && expected != staged.size
        {
            tracing::warn!(identifier = %artifact, expected, actual = staged.size, "resolver size hint was wrong");
        }

        let size = staged.size;
        let checksum = staged.checksum;
        let source_url = staged.final_url.to_string();

        match place_staged(staged.path, &dest, replace)? {
            Placement::Placed => {
                tracing::info!(
                    identifier = %artifact,
                    path = %dest.display(),
                    bytes = size,
                    download_ms = staged.download_ms,
                    "downloaded artifact"
                );
                let entry = CacheEntry {
                    key: compute_cache_key(&artifact, identity),
                    identifier: artifact.normalized_string(),
                    resolver: identity.to_string(),
                    path: self.cache.path_within_cache(&artifact, identity)?,
                    size,
                    checksum,
                    created_at: Utc::now(),
                    source_url: Some(source_url),
                };
                if let Err(e) = self.cache.record_entry(&entry) {
                    tracing::warn!(identifier = %artifact, error = %e, "failed to record cache entry");
                }
            }
            Placement::AlreadyPresent => {
                tracing::debug!(identifier = %artifact, path = %dest.display(), "artifact placed by another writer");
            }
        }

        Ok(dest)
    }

    /// Drop a cached resolver response whose checksum the served bytes
    /// contradict, so the next call asks the resolver again.
    fn forget_response(&self, artifact: &Identifier) {
        let signature = self.resolver.signature(artifact);
        match self.cache.local_api_cache().remove(&signature) {
            Ok(true) => tracing::warn!(identifier = %artifact, "dropped cached resolver response after checksum mismatch"),
            Ok(false) => {}
            Err(e) => tracing::warn!(identifier = %artifact, error = %e, "failed to drop cached resolver response"),
        }
    }
}

/// What the cache holds at an artifact path.
#[derive(Debug)]
enum CachedState {
    Miss,
    Hit { verified: bool },
    Stale(Verification),
}

/// Blocking part of a lookup: stat the artifact and, when it has an entry,
/// check it (re-hashing the file if `deep`).
fn inspect(
    cache: &dyn CacheManager, artifact: &Identifier, identity: &str, dest: &Path, deep: bool,
) -> Result<CachedState, Error> {
    if !dest.is_file() {
        return Ok(CachedState::Miss);
    }
    let Some(entry) = cache.entry(artifact, identity) else {
        return Ok(CachedState::Hit { verified: false });
    };
    Ok(match entry.verify(dest, deep)? {
        Verification::Valid => CachedState::Hit { verified: true },
        mismatch => CachedState::Stale(mismatch),
    })
}
