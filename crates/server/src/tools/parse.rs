//! scidd_parse tool implementation.
//!
//! Parses and normalizes an identifier. No I/O.

use super::{IdentifierParams, json_result};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use scidd_core::ResourceType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output structure for scidd_parse tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ParseOutput {
    /// Canonical form; parsing it again yields the same identifier.
    pub normalized: String,
    pub scheme: String,
    pub domain: String,
    pub resource_type: ResourceType,
    pub path_segments: Vec<String>,
    /// Query payload (search identifiers only).
    pub query: Option<String>,
    pub fragment: Option<String>,
    pub filename: Option<String>,
    /// Whether the identifier can be materialised as a single local file.
    pub is_artifact: bool,
}

/// Implementation of the scidd_parse tool.
pub fn parse_impl(params: &IdentifierParams) -> Result<CallToolResult, McpError> {
    let identifier = params.parse()?;

    let output = ParseOutput {
        normalized: identifier.normalized_string(),
        scheme: identifier.scheme().to_string(),
        domain: identifier.domain().to_string(),
        resource_type: identifier.resource_type(),
        path_segments: identifier.path_segments().to_vec(),
        query: identifier.query().map(str::to_string),
        fragment: identifier.fragment().map(str::to_string),
        filename: identifier.filename().map(str::to_string),
        is_artifact: identifier.resource_type().is_artifact(),
    };

    json_result(&output)
}
