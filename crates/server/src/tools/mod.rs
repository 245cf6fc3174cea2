//! MCP tool implementations.
//!
//! This module contains all tools exposed by the scidd server.

pub mod cache_status;
pub mod local_path;
pub mod parse;
pub mod resolve;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use scidd_core::{Error, Identifier};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input shared by every tool: a single identifier.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IdentifierParams {
    /// Identifier text, e.g. `scidd:/astro/file/sdss/dr16/frame-g-006073-1-0025.fits`.
    pub identifier: String,
}

impl IdentifierParams {
    pub fn parse(&self) -> Result<Identifier, Error> {
        if self.identifier.trim().is_empty() {
            return Err(Error::InvalidInput("identifier cannot be empty".into()));
        }
        Identifier::parse(&self.identifier)
    }
}

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(Error::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) fn text_of(result: &CallToolResult) -> String {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    content_val.get("text").and_then(|v| v.as_str()).expect("Expected text field in content").to_string()
}

/// A `FileResource` whose resolver is a mock server answering every
/// `/resolve` with `artifact_url`.
#[cfg(test)]
pub(crate) async fn mock_resource(
    root: &std::path::Path, artifact_url: &str,
) -> (wiremock::MockServer, scidd_client::FileResource) {
    use scidd_client::{DownloadConfig, Downloader, FileResource, HttpResolver, ResolverConfig, RetryPolicy};
    use scidd_core::FsCacheManager;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resolve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "url": artifact_url })))
        .mount(&server)
        .await;

    let mut config = ResolverConfig::new(server.uri().parse().unwrap());
    config.retry = RetryPolicy::none();
    let resource = FileResource::new(
        Arc::new(HttpResolver::new(config).unwrap()),
        Arc::new(FsCacheManager::new(root)),
        Downloader::new(DownloadConfig::default()).unwrap(),
    )
    .unwrap();
    (server, resource)
}
