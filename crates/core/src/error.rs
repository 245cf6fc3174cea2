//! Unified error types for scidd.
//!
//! Every variant carries a stable upper-case code in its `Display` output so
//! callers (and MCP clients) can tell "resource doesn't exist" apart from
//! "network unreachable" apart from "disk full".

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Unified error type for identifier handling, resolution and caching.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The identifier text could not be parsed.
    #[error("MALFORMED_IDENTIFIER: {0}")]
    MalformedIdentifier(String),

    /// A fragment was attached to a resource type that does not permit one.
    #[error("UNSUPPORTED_FRAGMENT: {0}")]
    UnsupportedFragment(String),

    /// The identifier never maps to a single cached artifact (e.g. a search).
    #[error("NOT_AN_ARTIFACT: {0}")]
    NotAnArtifact(String),

    /// Network or transport failure while resolving or downloading.
    #[error("RESOLUTION_ERROR: {0}")]
    Resolution(String),

    /// The resolver (or the artifact host) reports no such resource.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// The resolver could not narrow the identifier down to one resource.
    #[error("AMBIGUOUS_RESOLUTION: {0}")]
    AmbiguousResolution(String),

    /// Download exceeds the configured byte limit.
    #[error("DOWNLOAD_TOO_LARGE: {0}")]
    TooLarge(String),

    /// Downloaded bytes do not match the checksum the resolver announced.
    #[error("CHECKSUM_MISMATCH: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Filesystem failure inside the cache tree (disk full, permission denied, ...).
    #[error("CACHE_IO: {context}: {source}")]
    CacheIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A cache record could not be encoded or decoded.
    #[error("SERIALIZATION_ERROR: {0}")]
    Serialization(String),

    /// A cache-manager substitute failed the conformance check.
    #[error("INTERFACE_ERROR: {0}")]
    Interface(String),

    /// Invalid input parameters (e.g. a malformed resolver identity).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Wrap an I/O error with a short description of what was being done.
    pub fn cache_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::CacheIo { context: context.into(), source }
    }

    /// Whether a resolver may retry the operation that produced this error.
    ///
    /// Only transport failures qualify; identifier, interface and cache errors
    /// are terminal.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Resolution(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::MalformedIdentifier(_) | Error::UnsupportedFragment(_) | Error::InvalidInput(_) => {
                (-32602, err.to_string())
            }
            Error::NotAnArtifact(_) => (-32001, err.to_string()),
            Error::Resolution(_) => (-32002, err.to_string()),
            Error::NotFound(_) => (-32003, err.to_string()),
            Error::AmbiguousResolution(_) => (-32004, err.to_string()),
            Error::TooLarge(_) => (-32005, err.to_string()),
            Error::ChecksumMismatch { .. } => (-32006, err.to_string()),
            Error::CacheIo { .. } | Error::Serialization(_) => (-32007, err.to_string()),
            Error::Interface(_) => (-32008, err.to_string()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
