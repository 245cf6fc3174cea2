//! scidd_cache_status tool implementation.
//!
//! Reports what the local cache holds for an identifier. Filesystem only; no
//! resolver is needed and no network I/O is performed.

use super::{IdentifierParams, json_result};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use scidd_core::{CacheEntry, CacheManager, RequestSignature};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output structure for scidd_cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    pub identifier: String,
    /// Resolver identity the cache is keyed by.
    pub resolver: String,
    pub cache_root: String,
    /// Expected artifact path; absent for search identifiers.
    pub path: Option<String>,
    /// Whether the artifact file is present.
    pub cached: bool,
    /// Recorded download metadata, if any.
    pub entry: Option<CacheEntry>,
    /// Whether an idempotent resolver response is cached.
    pub api_response_cached: bool,
}

/// Implementation of the scidd_cache_status tool.
pub fn cache_status_impl(
    cache: &dyn CacheManager, resolver_identity: &str, params: &IdentifierParams,
) -> Result<CallToolResult, McpError> {
    let identifier = params.parse()?;
    let artifact = identifier.without_fragment();

    let (path, cached, entry) = if artifact.resource_type().is_artifact() {
        let path = cache.artifact_path(&artifact, resolver_identity)?;
        let cached = path.is_file();
        let entry = if cached { cache.entry(&artifact, resolver_identity) } else { None };
        (Some(path.display().to_string()), cached, entry)
    } else {
        (None, false, None)
    };

    // Signed exactly as scidd_resolve signs it, fragment included.
    let signature = RequestSignature::new(resolver_identity, &identifier);
    let output = CacheStatusOutput {
        identifier: identifier.normalized_string(),
        resolver: resolver_identity.to_string(),
        cache_root: cache.path().display().to_string(),
        path,
        cached,
        entry,
        api_response_cached: cache.local_api_cache().has(&signature),
    };

    tracing::debug!(identifier = %identifier, cached = output.cached, "cache status");
    json_result(&output)
}
