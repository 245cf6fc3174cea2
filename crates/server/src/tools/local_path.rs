//! scidd_local_path tool implementation.
//!
//! Materialises the artifact for an identifier in the local cache and
//! returns its path, downloading it only on a cache miss.

use super::{IdentifierParams, json_result};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use scidd_client::FileResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Output structure for scidd_local_path tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LocalPathOutput {
    pub identifier: String,
    /// Absolute path of the cached artifact.
    pub path: String,
    /// Whether the artifact was already cached before this call.
    pub cached_before: bool,
    /// File size in bytes.
    pub size: u64,
    pub elapsed_ms: u64,
}

/// Implementation of the scidd_local_path tool.
pub async fn local_path_impl(resource: &FileResource, params: &IdentifierParams) -> Result<CallToolResult, McpError> {
    let start = Instant::now();
    let identifier = params.parse()?;

    let cached_before = resource.exists_in_cache(&identifier)?;
    let path = resource.local_path(&identifier).await?;
    let size = std::fs::metadata(&path)
        .map_err(|e| scidd_core::Error::cache_io(format!("failed to stat {}", path.display()), e))?
        .len();

    let output = LocalPathOutput {
        identifier: identifier.normalized_string(),
        path: path.display().to_string(),
        cached_before,
        size,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    json_result(&output)
}
