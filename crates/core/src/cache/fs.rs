//! Default filesystem cache manager.

use super::api::LocalApiCache;
use super::manager::{BOOKKEEPING_DIR, CacheManager};
use crate::config::AppConfig;
use crate::resolver::validate_resolver_identity;
use crate::{Error, Identifier};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
struct State {
    root: PathBuf,
    api: Arc<LocalApiCache>,
}

impl State {
    fn at(root: PathBuf) -> Self {
        let api = Arc::new(LocalApiCache::new(root.join(BOOKKEEPING_DIR).join("api")));
        Self { root, api }
    }
}

/// Cache manager storing artifacts as plain files under a root directory.
///
/// The root is not created until something is written beneath it.
#[derive(Debug)]
pub struct FsCacheManager {
    state: RwLock<State>,
}

impl FsCacheManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { state: RwLock::new(State::at(root.into())) }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.cache_dir.clone())
    }
}

impl CacheManager for FsCacheManager {
    fn path(&self) -> PathBuf {
        self.state.read().root.clone()
    }

    /// Point the manager at a new root, creating it if needed.
    ///
    /// Rejects paths that exist but are not directories, and read-only
    /// directories.
    fn set_path(&self, root: PathBuf) -> Result<(), Error> {
        if root.as_os_str().is_empty() {
            return Err(Error::InvalidInput("cache root must not be empty".into()));
        }

        std::fs::create_dir_all(&root)
            .map_err(|e| Error::cache_io(format!("failed to create cache root {}", root.display()), e))?;
        let metadata = std::fs::metadata(&root)
            .map_err(|e| Error::cache_io(format!("failed to stat cache root {}", root.display()), e))?;
        if !metadata.is_dir() {
            return Err(Error::InvalidInput(format!("cache root {} is not a directory", root.display())));
        }
        if metadata.permissions().readonly() {
            return Err(Error::InvalidInput(format!("cache root {} is read-only", root.display())));
        }

        let mut state = self.state.write();
        tracing::info!(from = %state.root.display(), to = %root.display(), "cache root changed");
        *state = State::at(root);
        Ok(())
    }

    fn path_within_cache(&self, identifier: &Identifier, resolver_identity: &str) -> Result<PathBuf, Error> {
        default_path_within_cache(identifier, resolver_identity)
    }

    fn local_api_cache(&self) -> Arc<LocalApiCache> {
        Arc::clone(&self.state.read().api)
    }
}

/// Layout used by [`FsCacheManager`]:
/// `<resolver>/<domain…>/<type-tag>/<path…>`, with a fragment appended to the
/// last segment as `name#fragment`. The fragment is percent-encoded (`%`, `/`
/// and `\`) so it always stays inside that one component.
///
/// Public so custom managers can wrap it (e.g. to add sharding).
pub fn default_path_within_cache(identifier: &Identifier, resolver_identity: &str) -> Result<PathBuf, Error> {
    let resource_type = identifier.resource_type();
    if !resource_type.is_artifact() {
        return Err(Error::NotAnArtifact(format!("{identifier} does not name a single artifact")));
    }
    validate_resolver_identity(resolver_identity)?;

    let Some((last, parents)) = identifier.path_segments().split_last() else {
        return Err(Error::NotAnArtifact(format!("{identifier} has no path")));
    };

    let mut path = PathBuf::from(resolver_identity);
    path.extend(identifier.domain().split('/'));
    path.push(resource_type.tag());
    path.extend(parents);
    match identifier.fragment() {
        Some(fragment) => path.push(format!("{last}#{}", encode_fragment(fragment))),
        None => path.push(last),
    }
    Ok(path)
}

fn encode_fragment(fragment: &str) -> String {
    let mut encoded = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            '/' => encoded.push_str("%2F"),
            '\\' => encoded.push_str("%5C"),
            c => encoded.push(c),
        }
    }
    encoded
}
