//! scidd_resolve tool implementation.
//!
//! Resolves an identifier (any type, including search) to its resolver
//! response, answering from the API-response cache when possible.

use super::{IdentifierParams, json_result};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use scidd_client::FileResource;
use scidd_core::ResolverResponse;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output structure for scidd_resolve tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResolveOutput {
    pub identifier: String,
    pub resolver: String,
    /// Whether the response came from the API-response cache.
    pub from_cache: bool,
    pub response: ResolverResponse,
}

/// Implementation of the scidd_resolve tool.
pub async fn resolve_impl(resource: &FileResource, params: &IdentifierParams) -> Result<CallToolResult, McpError> {
    let identifier = params.parse()?;
    let resolver = resource.resolver();

    let signature = resolver.signature(&identifier);
    let from_cache = resource.cache().local_api_cache().has(&signature);
    let response = resource.resolve(&identifier).await?;

    let output = ResolveOutput {
        identifier: identifier.normalized_string(),
        resolver: resolver.identity().to_string(),
        from_cache,
        response,
    };

    json_result(&output)
}
