//! Streaming artifact downloads.
//!
//! ### URL Validation
//! - Trim whitespace, require an absolute http(s) URL
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Staging
//! - The body is streamed chunk by chunk into a `.part` file under the cache's
//!   staging directory, hashed with SHA-256 as it arrives.
//! - The byte limit is enforced on `Content-Length` and again while streaming.
//! - The staging file is deleted on drop, so errors and cancellation leave
//!   nothing behind. Placing it at its final path is the caller's job.

pub mod url;

use chrono::DateTime;
use reqwest::{Client, StatusCode, Url, header};
use scidd_core::Error;
use scidd_core::cache::stage_file;
use scidd_core::config::AppConfig;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

pub use url::{UrlError, canonicalize};

/// Configuration for the downloader.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// User agent string (default: "scidd/0.1")
    pub user_agent: String,

    /// Largest accepted artifact in bytes (default: 4GiB)
    pub max_bytes: u64,

    /// Request timeout (default: 60s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 10)
    pub max_redirects: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            user_agent: "scidd/0.1".to_string(),
            max_bytes: 4 * 1024 * 1024 * 1024,
            timeout: Duration::from_millis(60_000),
            max_redirects: 10,
        }
    }
}

impl From<&AppConfig> for DownloadConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_download_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// A fully downloaded, not yet placed artifact.
#[derive(Debug)]
pub struct StagedDownload {
    /// Staging file; deleted when dropped.
    pub path: TempPath,
    /// URL the bytes were served from, after redirects.
    pub final_url: Url,
    pub size: u64,
    /// SHA-256 of the body, hex encoded.
    pub checksum: String,
    pub content_type: Option<String>,
    pub last_modified: Option<SystemTime>,
    /// Time taken to download in milliseconds
    pub download_ms: u64,
}

/// HTTP client that streams artifacts into staging files.
pub struct Downloader {
    http: Client,
    config: DownloadConfig,
}

fn transport_error(action: &str, url: &Url, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Resolution(format!("timed out {action} {url}"))
    } else {
        Error::Resolution(format!("network error {action} {url}: {err}"))
    }
}

fn too_large(len: u64, max: u64) -> Error {
    Error::TooLarge(format!("{len} bytes exceeds {max}"))
}

fn parse_last_modified(headers: &header::HeaderMap) -> Option<SystemTime> {
    let value = headers.get(header::LAST_MODIFIED)?.to_str().ok()?;
    DateTime::parse_from_rfc2822(value).ok().map(SystemTime::from)
}

impl Downloader {
    /// Create a new downloader with the given configuration.
    pub fn new(config: DownloadConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Self::new(DownloadConfig::from(config))
    }

    /// Download `url` into a new staging file under `staging_dir`.
    ///
    /// # Errors
    ///
    /// `NotFound` for 404/410, `Resolution` for other failures and transport
    /// errors, `TooLarge` past the byte limit, `CacheIo` for local failures.
    pub async fn download(&self, url: &Url, staging_dir: &Path) -> Result<StagedDownload, Error> {
        let start = Instant::now();
        let url = canonicalize(url.as_str()).map_err(|e| Error::Resolution(format!("resolver returned {e}")))?;

        let mut response =
            self.http.get(url.as_str()).send().await.map_err(|e| transport_error("requesting", &url, &e))?;

        let status = response.status();
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
            return Err(Error::NotFound(format!("{url} returned status {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(Error::Resolution(format!("{url} returned status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len > self.config.max_bytes
        {
            return Err(too_large(len, self.config.max_bytes));
        }

        let final_url = response.url().clone();
        let content_type =
            response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
        let last_modified = parse_last_modified(response.headers());

        let (file, path) = stage_file(staging_dir)?;
        let mut file = tokio::fs::File::from_std(file);
        let mut hasher = Sha256::new();
        let mut size: u64 = 0;

        while let Some(chunk) = response.chunk().await.map_err(|e| transport_error("reading", &url, &e))? {
            size += chunk.len() as u64;
            if size > self.config.max_bytes {
                return Err(too_large(size, self.config.max_bytes));
            }
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::cache_io(format!("failed to write {}", path.display()), e))?;
        }

        file.flush().await.map_err(|e| Error::cache_io(format!("failed to flush {}", path.display()), e))?;
        file.sync_all().await.map_err(|e| Error::cache_io(format!("failed to sync {}", path.display()), e))?;

        if let Some(modified) = last_modified {
            let file = file.into_std().await;
            if let Err(e) = file.set_modified(modified) {
                tracing::warn!(path = %path.display(), error = %e, "failed to set modification time");
            }
        }

        let download_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(url = %url, final_url = %final_url, bytes = size, download_ms, "downloaded artifact");

        Ok(StagedDownload {
            path,
            final_url,
            size,
            checksum: hex::encode(hasher.finalize()),
            content_type,
            last_modified,
            download_ms,
        })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader(max_bytes: u64) -> Downloader {
        Downloader::new(DownloadConfig { max_bytes, ..Default::default() }).unwrap()
    }

    fn staged_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    #[test]
    fn test_download_config_default() {
        let config = DownloadConfig::default();
        assert_eq!(config.user_agent, "scidd/0.1");
        assert_eq!(config.max_bytes, 4 * 1024 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(60_000));
        assert_eq!(config.max_redirects, 10);
    }

    #[test]
    fn test_download_config_from_app_config() {
        let app = AppConfig { user_agent: "custom/1".into(), max_download_bytes: 10, timeout_ms: 500, ..Default::default() };
        let config = DownloadConfig::from(&app);
        assert_eq!(config.user_agent, "custom/1");
        assert_eq!(config.max_bytes, 10);
        assert_eq!(config.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_parse_last_modified() {
        let mut headers = header::HeaderMap::new();
        assert_eq!(parse_last_modified(&headers), None);

        headers.insert(header::LAST_MODIFIED, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        let modified = parse_last_modified(&headers).unwrap();
        assert_eq!(modified.duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs(), 1_445_412_480);
    }

    #[tokio::test]
    async fn test_download_streams_to_staging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/frame.fits"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"abc".to_vec())
                    .insert_header("Content-Type", "application/fits")
                    .insert_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let url = Url::parse(&format!("{}/frame.fits", server.uri())).unwrap();
        let staged = downloader(1024).download(&url, dir.path()).await.unwrap();

        assert_eq!(staged.size, 3);
        assert_eq!(staged.checksum, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(staged.content_type.as_deref(), Some("application/fits"));
        assert_eq!(std::fs::read(&staged.path).unwrap(), b"abc");
        assert!(staged.path.to_string_lossy().ends_with(".part"));

        let mtime = std::fs::metadata(&staged.path).unwrap().modified().unwrap();
        assert_eq!(mtime.duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs(), 1_445_412_480);
    }

    #[tokio::test]
    async fn test_download_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let dir = TempDir::new().unwrap();
        let url = Url::parse(&format!("{}/missing.fits", server.uri())).unwrap();
        let result = downloader(1024).download(&url, dir.path()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_download_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let dir = TempDir::new().unwrap();
        let url = Url::parse(&format!("{}/frame.fits", server.uri())).unwrap();
        let result = downloader(1024).download(&url, dir.path()).await;
        assert!(matches!(result, Err(Error::Resolution(_))));
    }

    #[tokio::test]
    async fn test_download_too_large_leaves_nothing_staged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let url = Url::parse(&format!("{}/big.fits", server.uri())).unwrap();
        let result = downloader(1024).download(&url, dir.path()).await;
        assert!(matches!(result, Err(Error::TooLarge(_))));
        assert_eq!(staged_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_download_rejects_non_http_url() {
        let dir = TempDir::new().unwrap();
        let url = Url::parse("file:///etc/passwd").unwrap();
        let result = downloader(1024).download(&url, dir.path()).await;
        assert!(matches!(result, Err(Error::Resolution(_))));
    }
}
