//! Validation of resolved download URLs.

/// Error type for URL validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Validate and normalize a URL handed back by a resolver.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Require an absolute http(s) URL with a host
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (signed URLs depend on it)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    let Some(host) = parsed.host_str().filter(|h| !h.is_empty()) else {
        return Err(UrlError::MissingHost(trimmed.to_string()));
    };
    let host = host.to_lowercase();
    parsed.set_host(Some(&host)).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    parsed.set_fragment(None);

    Ok(parsed)
}
