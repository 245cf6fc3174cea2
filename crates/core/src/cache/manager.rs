//! The cache-manager contract.
//!
//! A [`CacheManager`] owns a cache root, decides where each artifact lives
//! beneath it and hands out the [`LocalApiCache`] used by resolvers. Any type
//! implementing the trait can replace [`FsCacheManager`](super::FsCacheManager),
//! provided it passes [`conforms_to_interface`] when registered.

use super::api::LocalApiCache;
use super::entry::{CacheEntry, load_entry, store_entry};
use super::fs::FsCacheManager;
use super::hash::compute_cache_key;
use crate::config::AppConfig;
use crate::{Error, Identifier};
use parking_lot::RwLock;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Reserved directory under every cache root for records and staging files.
pub const BOOKKEEPING_DIR: &str = ".scidd";

/// Owner of a cache root and its layout.
pub trait CacheManager: Send + Sync {
    /// Root directory of this cache.
    fn path(&self) -> PathBuf;

    /// Move the cache root. Already-cached files are not migrated; lookups
    /// under the new root simply miss.
    fn set_path(&self, root: PathBuf) -> Result<(), Error>;

    /// Relative location of the artifact for `identifier` resolved by
    /// `resolver_identity`.
    ///
    /// Must be pure, deterministic, and injective over distinct
    /// (identifier, resolver) pairs. Search identifiers yield `NotAnArtifact`.
    fn path_within_cache(&self, identifier: &Identifier, resolver_identity: &str) -> Result<PathBuf, Error>;

    /// API-response cache owned by this manager.
    fn local_api_cache(&self) -> Arc<LocalApiCache>;

    /// Absolute artifact location.
    fn artifact_path(&self, identifier: &Identifier, resolver_identity: &str) -> Result<PathBuf, Error> {
        Ok(self.path().join(self.path_within_cache(identifier, resolver_identity)?))
    }

    fn bookkeeping_dir(&self) -> PathBuf {
        self.path().join(BOOKKEEPING_DIR)
    }

    /// Directory for in-flight downloads. Same filesystem as the artifacts, so
    /// placement is a plain rename.
    fn staging_dir(&self) -> PathBuf {
        self.bookkeeping_dir().join("staging")
    }

    fn entries_dir(&self) -> PathBuf {
        self.bookkeeping_dir().join("entries")
    }

    /// Recorded entry for an artifact, if any.
    fn entry(&self, identifier: &Identifier, resolver_identity: &str) -> Option<CacheEntry> {
        load_entry(&self.entries_dir(), &compute_cache_key(identifier, resolver_identity))
    }

    fn record_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        store_entry(&self.entries_dir(), entry)
    }
}

const SAMPLE_RESOLVERS: [&str; 2] = ["conformance-a", "conformance-b"];

fn sample(text: &str) -> Result<Identifier, Error> {
    Identifier::parse(text).map_err(|e| Error::Interface(format!("conformance sample failed to parse: {e}")))
}

fn check_relative(path: &Path) -> Result<(), Error> {
    if path.as_os_str().is_empty() {
        return Err(Error::Interface("path_within_cache returned an empty path".into()));
    }
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(Error::Interface(format!(
            "path_within_cache must return a plain relative path, got {}",
            path.display()
        )));
    }
    Ok(())
}

/// Check that `candidate` behaves like a cache manager.
///
/// Checks with synthetic identifiers only; nothing is written to disk.
///
/// # Errors
///
/// `Interface` describing the first violated expectation.
pub fn conforms_to_interface(candidate: &dyn CacheManager) -> Result<(), Error> {
    let root = candidate.path();
    if root.as_os_str().is_empty() {
        return Err(Error::Interface("cache root is empty".into()));
    }

    let first = sample("scidd:/conformance/file/sample/first.dat")?;
    let second = sample("scidd:/conformance/file/sample/second.dat")?;
    let fragment = sample("scidd:/conformance/file/sample/first.dat#../../../escape")?;
    let search = sample("scidd:/conformance/search?q=sample")?;
    let [resolver_a, resolver_b] = SAMPLE_RESOLVERS;

    let mut seen = Vec::new();
    for (identifier, resolver) in
        [(&first, resolver_a), (&second, resolver_a), (&first, resolver_b), (&fragment, resolver_a)]
    {
        let path = candidate.path_within_cache(identifier, resolver)?;
        check_relative(&path)?;

        if candidate.path_within_cache(identifier, resolver)? != path {
            return Err(Error::Interface("path_within_cache is not deterministic".into()));
        }
        if seen.contains(&path) {
            return Err(Error::Interface(format!("path_within_cache maps two samples to {}", path.display())));
        }

        let absolute = root.join(&path);
        let reserved = [
            candidate.bookkeeping_dir(),
            candidate.local_api_cache().path().to_path_buf(),
            candidate.entries_dir(),
            candidate.staging_dir(),
        ];
        if reserved.iter().any(|dir| absolute.starts_with(dir)) {
            return Err(Error::Interface(format!(
                "artifact path {} overlaps cache bookkeeping",
                absolute.display()
            )));
        }
        seen.push(path);
    }

    match candidate.path_within_cache(&search, resolver_a) {
        Err(Error::NotAnArtifact(_)) => Ok(()),
        Err(other) => Err(Error::Interface(format!("search identifiers must yield NotAnArtifact, got {other}"))),
        Ok(path) => Err(Error::Interface(format!("search identifier mapped to artifact path {}", path.display()))),
    }
}

static DEFAULT_MANAGER: OnceLock<RwLock<Arc<dyn CacheManager>>> = OnceLock::new();

fn default_slot() -> &'static RwLock<Arc<dyn CacheManager>> {
    DEFAULT_MANAGER.get_or_init(|| {
        let root = match AppConfig::load() {
            Ok(config) => config.cache_dir,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load configuration, using default cache root");
                crate::config::default_cache_dir()
            }
        };
        tracing::debug!(root = %root.display(), "initialized default cache manager");
        RwLock::new(Arc::new(FsCacheManager::new(root)))
    })
}

/// Process-wide cache manager, constructed on first use.
///
/// All holders share one instance, so `set_path` on it is seen everywhere.
pub fn default_cache_manager() -> Arc<dyn CacheManager> {
    default_slot().read().clone()
}

/// Replace the process-wide cache manager after a conformance check.
///
/// # Errors
///
/// `Interface` if `manager` fails [`conforms_to_interface`].
pub fn set_default_cache_manager(manager: Arc<dyn CacheManager>) -> Result<(), Error> {
    conforms_to_interface(manager.as_ref())?;
    *default_slot().write() = manager;
    Ok(())
}
