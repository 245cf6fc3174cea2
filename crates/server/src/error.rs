//! Server-level errors not covered by `scidd_core::Error`.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use scidd_core::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The tool needs configuration the server was started without.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),
}

impl From<ServerError> for McpError {
    fn from(err: ServerError) -> Self {
        let code = match &err {
            ServerError::Config(_) => -32009,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
