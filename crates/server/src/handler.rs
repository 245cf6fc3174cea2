//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::error::ServerError;
use crate::tools::{
    IdentifierParams, cache_status::cache_status_impl, local_path::local_path_impl, parse::parse_impl,
    resolve::resolve_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use scidd_client::{Downloader, FileResource, HttpResolver, ResolverConfig};
use scidd_core::AppConfig;
use scidd_core::cache::{CacheManager, FsCacheManager, set_default_cache_manager};
use scidd_core::config::ConfigError;
use std::sync::Arc;

/// The main MCP server handler for scidd.
#[derive(Clone)]
pub struct SciddServer {
    tool_router: ToolRouter<Self>,
    config: Arc<AppConfig>,
    cache: Arc<dyn CacheManager>,
    /// Absent when no resolver URL is configured.
    resource: Option<Arc<FileResource>>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SciddServer {
    /// Create a new server handler.
    ///
    /// The cache manager built from `config` becomes the process-wide default.
    /// A missing resolver URL is not an error here; tools that need a
    /// resolver report it when called.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let cache: Arc<dyn CacheManager> = Arc::new(FsCacheManager::from_config(&config));
        set_default_cache_manager(Arc::clone(&cache))?;

        let resource = match ResolverConfig::from_app_config(&config) {
            Ok(resolver_config) => {
                let resolver = HttpResolver::new(resolver_config)?;
                let resource = FileResource::new(Arc::new(resolver), Arc::clone(&cache), Downloader::from_config(&config)?)?
                    .verify_checksums(config.verify_checksums);
                Some(Arc::new(resource))
            }
            Err(ConfigError::Missing { .. }) => {
                tracing::info!("no resolver configured; resolve and local_path tools are disabled");
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self { tool_router: Self::tool_router(), config: Arc::new(config), cache, resource })
    }

    fn resource(&self) -> Result<&FileResource, McpError> {
        match &self.resource {
            Some(resource) => Ok(resource.as_ref()),
            None => Err(ServerError::Config(ConfigError::Missing {
                field: "resolver_url".into(),
                hint: "Set SCIDD_RESOLVER_URL environment variable".into(),
            })
            .into()),
        }
    }

    /// Parse and normalize an identifier.
    ///
    /// No network or filesystem access.
    #[tool(
        description = "Parse a scidd identifier (e.g. scidd:/astro/file/sdss/dr16/frame.fits#1). Returns the normalized form and its components."
    )]
    async fn scidd_parse(&self, params: Parameters<IdentifierParams>) -> Result<CallToolResult, McpError> {
        parse_impl(&params.0)
    }

    /// Resolve an identifier to a retrievable URL.
    #[tool(
        description = "Resolve a scidd identifier to the URL and metadata reported by the resolver. Idempotent responses are cached locally."
    )]
    async fn scidd_resolve(&self, params: Parameters<IdentifierParams>) -> Result<CallToolResult, McpError> {
        resolve_impl(self.resource()?, &params.0).await
    }

    /// Download (if needed) and return the local path of an artifact.
    #[tool(
        description = "Return the local file path for a scidd identifier, downloading it into the cache on first use. Fragments are ignored for file lookup."
    )]
    async fn scidd_local_path(&self, params: Parameters<IdentifierParams>) -> Result<CallToolResult, McpError> {
        local_path_impl(self.resource()?, &params.0).await
    }

    /// Report cache state for an identifier without network access.
    #[tool(
        description = "Report whether a scidd identifier is cached locally, where it would be stored, and whether its resolver response is cached. No network access."
    )]
    async fn scidd_cache_status(&self, params: Parameters<IdentifierParams>) -> Result<CallToolResult, McpError> {
        let identity = match &self.resource {
            Some(resource) => resource.resolver().identity().to_string(),
            None => self.config.resolver_identity.clone(),
        };
        cache_status_impl(self.cache.as_ref(), &identity, &params.0)
    }
}

impl ServerHandler for SciddServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "scidd".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Resolve scidd scientific-data identifiers to URLs and cached local files.".into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
