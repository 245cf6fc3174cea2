//! Reference REST resolver.
//!
//! Resolves identifiers against a service speaking a minimal JSON protocol.
//!
//! ### Protocol
//!
//! - **Endpoint**: `GET {base_url}/resolve?scidd=<normalized identifier>`
//! - **Response**: `{ "url", "size"?, "checksum"?, "content_type"?, "idempotent"?, "metadata"? }`;
//!   `idempotent` defaults to true, `Cache-Control: no-store` forces volatile.
//! - **Status mapping**: 404 is `NotFound`; 300 and 409 are
//!   `AmbiguousResolution`; 408, 429 and 5xx are retried with backoff, as are
//!   timeouts and connection failures; anything else is `Resolution`.

pub mod retry;

pub use retry::{AttemptError, RetryPolicy};

use async_trait::async_trait;
use reqwest::{StatusCode, Url, header};
use scidd_core::cache::CacheManager;
use scidd_core::config::{AppConfig, ConfigError};
use scidd_core::resolver::{Resolver, ResolverResponse, resolve_with_cache, validate_resolver_identity};
use scidd_core::{Error, Identifier};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Identity used when none is configured.
pub const DEFAULT_IDENTITY: &str = "scidd-rest";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "scidd/0.1";

/// REST resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Service root; `/resolve` is appended.
    pub base_url: Url,
    /// Name used in cache keys (default: scidd-rest).
    pub identity: String,
    pub user_agent: String,
    /// Per-attempt timeout (default: 60s).
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ResolverConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            identity: DEFAULT_IDENTITY.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Build from application configuration.
    ///
    /// # Errors
    ///
    /// `ConfigError::Missing` when `SCIDD_RESOLVER_URL` is not set.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: config.require_resolver_url()?,
            identity: config.resolver_identity.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            retry: RetryPolicy::from(config),
        })
    }
}

/// Body of a successful `/resolve` response.
#[derive(Debug, Deserialize)]
struct WireResponse {
    url: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default = "default_idempotent")]
    idempotent: bool,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

fn default_idempotent() -> bool {
    true
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

impl WireResponse {
    fn into_response(self, no_store: bool) -> Result<ResolverResponse, Error> {
        let url = Url::parse(&self.url)
            .map_err(|e| Error::Resolution(format!("resolver returned invalid URL '{}': {e}", self.url)))?;

        let mut response = if self.idempotent && !no_store {
            ResolverResponse::idempotent(url)
        } else {
            ResolverResponse::volatile(url)
        };
        if let Some(size) = self.size {
            response = response.with_size(size);
        }
        if let Some(checksum) = self.checksum {
            if !is_sha256_hex(&checksum) {
                return Err(Error::Resolution(format!("resolver returned invalid checksum '{checksum}'")));
            }
            response = response.with_checksum(checksum);
        }
        if let Some(content_type) = self.content_type {
            response = response.with_content_type(content_type);
        }
        response.metadata = self.metadata;
        Ok(response)
    }
}

/// Resolver backed by a REST service.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    http: reqwest::Client,
    config: ResolverConfig,
}

impl HttpResolver {
    /// Create a new resolver with the given configuration.
    pub fn new(config: ResolverConfig) -> Result<Self, Error> {
        validate_resolver_identity(&config.identity)?;
        match config.base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidInput(format!("unsupported resolver URL scheme: {scheme}"))),
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Request URL for `identifier`.
    pub fn endpoint(&self, identifier: &Identifier) -> Result<Url, Error> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidInput(format!("resolver URL {} cannot be a base", self.config.base_url)))?
            .pop_if_empty()
            .push("resolve");
        url.query_pairs_mut().append_pair("scidd", identifier.as_str());
        Ok(url)
    }

    async fn fetch(&self, identifier: &Identifier) -> Result<ResolverResponse, Error> {
        let endpoint = self.endpoint(identifier)?;
        tracing::debug!(identifier = %identifier, endpoint = %endpoint, "querying resolver");

        let response = self.config.retry.run(identifier.as_str(), || self.fetch_once(&endpoint, identifier)).await?;

        tracing::debug!(
            identifier = %identifier,
            url = %response.url,
            idempotent = response.idempotent,
            "resolved identifier"
        );
        Ok(response)
    }

    async fn fetch_once(&self, endpoint: &Url, identifier: &Identifier) -> Result<ResolverResponse, AttemptError> {
        let http_response = self
            .http
            .get(endpoint.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::Transient("request timed out".into())
                } else {
                    AttemptError::Transient(format!("network error: {e}"))
                }
            })?;

        let status = http_response.status();
        match status {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(AttemptError::Terminal(Error::NotFound(identifier.normalized_string())));
            }
            StatusCode::MULTIPLE_CHOICES | StatusCode::CONFLICT => {
                let detail = http_response.text().await.unwrap_or_default();
                return Err(AttemptError::Terminal(Error::AmbiguousResolution(format!(
                    "{identifier}: {}",
                    detail.trim()
                ))));
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                return Err(AttemptError::Transient(format!("status {}", status.as_u16())));
            }
            s if s.is_server_error() => {
                return Err(AttemptError::Transient(format!("status {}", status.as_u16())));
            }
            _ => {
                return Err(AttemptError::Terminal(Error::Resolution(format!(
                    "resolver returned status {} for {identifier}",
                    status.as_u16()
                ))));
            }
        }

        let no_store = http_response
            .headers()
            .get_all(header::CACHE_CONTROL)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.to_ascii_lowercase().contains("no-store"));

        let bytes = http_response
            .bytes()
            .await
            .map_err(|e| AttemptError::Transient(format!("failed to read response: {e}")))?;
        let wire: WireResponse = serde_json::from_slice(&bytes).map_err(|e| {
            AttemptError::Terminal(Error::Resolution(format!("malformed resolver response for {identifier}: {e}")))
        })?;

        wire.into_response(no_store).map_err(AttemptError::Terminal)
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    fn identity(&self) -> &str {
        &self.config.identity
    }

    async fn resolve(&self, identifier: &Identifier, cache: &dyn CacheManager) -> Result<ResolverResponse, Error> {
        let signature = self.signature(identifier);
        resolve_with_cache(cache, &signature, || self.fetch(identifier)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scidd_core::cache::FsCacheManager;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FRAME: &str = "scidd:/astro/file/sdss/dr16/frame-g-006073-1-0025.fits";

    fn frame() -> Identifier {
        Identifier::parse(FRAME).unwrap()
    }

    fn resolver(server: &MockServer) -> HttpResolver {
        let mut config = ResolverConfig::new(Url::parse(&server.uri()).unwrap());
        config.identity = "test-rest".into();
        config.retry =
            RetryPolicy { max_retries: 2, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(2) };
        HttpResolver::new(config).unwrap()
    }

    fn ok_body() -> serde_json::Value {
        serde_json::json!({
            "url": "https://example.org/frame.fits",
            "size": 3,
            "checksum": "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD",
            "content_type": "application/fits",
            "metadata": { "release": "dr16" }
        })
    }

    #[test]
    fn test_endpoint() {
        let mut config = ResolverConfig::new(Url::parse("https://resolver.example.org/api/").unwrap());
        config.identity = "r".into();
        let resolver = HttpResolver::new(config).unwrap();
        let url = resolver.endpoint(&frame()).unwrap();
        assert_eq!(url.path(), "/api/resolve");
        assert_eq!(url.query_pairs().next().unwrap().1, FRAME);
    }

    #[test]
    fn test_new_rejects_bad_identity() {
        let mut config = ResolverConfig::new(Url::parse("https://resolver.example.org").unwrap());
        config.identity = ".scidd".into();
        assert!(matches!(HttpResolver::new(config), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_config_from_app_config() {
        assert!(matches!(ResolverConfig::from_app_config(&AppConfig::default()), Err(ConfigError::Missing { .. })));

        let app = AppConfig { resolver_url: Some("http://localhost:9000".into()), ..Default::default() };
        let config = ResolverConfig::from_app_config(&app).unwrap();
        assert_eq!(config.identity, DEFAULT_IDENTITY);
        assert_eq!(config.base_url.port(), Some(9000));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[tokio::test]
    async fn test_resolve_parses_response_and_caches_it() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resolve"))
            .and(query_param("scidd", FRAME))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let cache = FsCacheManager::new(dir.path());
        let resolver = resolver(&server);

        let first = resolver.resolve(&frame(), &cache).await.unwrap();
        assert_eq!(first.url.as_str(), "https://example.org/frame.fits");
        assert_eq!(first.size, Some(3));
        assert_eq!(
            first.checksum.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert!(first.idempotent);
        assert_eq!(first.metadata.get("release"), Some(&serde_json::json!("dr16")));

        let second = resolver.resolve(&frame(), &cache).await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_no_store_is_volatile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resolve"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "url": "https://example.org/signed?exp=1" }))
                    .insert_header("Cache-Control", "private, no-store"),
            )
            .expect(2)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let cache = FsCacheManager::new(dir.path());
        let resolver = resolver(&server);

        for _ in 0..2 {
            assert!(!resolver.resolve(&frame(), &cache).await.unwrap().idempotent);
        }
        assert!(!cache.local_api_cache().has(&resolver.signature(&frame())));
    }

    #[tokio::test]
    async fn test_explicit_volatile_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "url": "https://example.org/x", "idempotent": false })),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let response = resolver(&server).resolve(&frame(), &FsCacheManager::new(dir.path())).await.unwrap();
        assert!(!response.idempotent);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        for (status, code) in
            [(404u16, "NOT_FOUND"), (409, "AMBIGUOUS_RESOLUTION"), (300, "AMBIGUOUS_RESOLUTION"), (403, "RESOLUTION_ERROR")]
        {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(status).set_body_string("frame-g or frame-r?"))
                .expect(1)
                .mount(&server)
                .await;

            let dir = TempDir::new().unwrap();
            let err = resolver(&server).resolve(&frame(), &FsCacheManager::new(dir.path())).await.unwrap_err();
            assert!(err.to_string().starts_with(code), "status {status}: {err}");
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let response = resolver(&server).resolve(&frame(), &FsCacheManager::new(dir.path())).await.unwrap();
        assert_eq!(response.url.as_str(), "https://example.org/frame.fits");
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(429)).expect(3).mount(&server).await;

        let dir = TempDir::new().unwrap();
        let err = resolver(&server).resolve(&frame(), &FsCacheManager::new(dir.path())).await.unwrap_err();
        assert!(matches!(err, Error::Resolution(_)), "{err}");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = resolver(&server).resolve(&frame(), &FsCacheManager::new(dir.path())).await.unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[tokio::test]
    async fn test_resolves_search_identifiers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("scidd", "scidd:/astro/search?ra=10.5&dec=-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let search = Identifier::parse("scidd:/astro/search?ra=10.5&dec=-3").unwrap();
        let response = resolver(&server).resolve(&search, &FsCacheManager::new(dir.path())).await.unwrap();
        assert_eq!(response.size, Some(3));
    }
}
