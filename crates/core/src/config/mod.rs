//! Application configuration with layered loading.
//!
//! Configuration is loaded with figment from, in order of precedence:
//!
//! 1. Environment variables (SCIDD_*)
//! 2. TOML config file (if SCIDD_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root of the artifact cache.
    ///
    /// Set via SCIDD_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Base URL of the REST resolver service.
    ///
    /// Set via SCIDD_RESOLVER_URL environment variable.
    /// Required only when a resolver is built.
    #[serde(default)]
    pub resolver_url: Option<String>,

    /// Name the REST resolver uses in cache keys.
    ///
    /// Set via SCIDD_RESOLVER_IDENTITY environment variable.
    #[serde(default = "default_resolver_identity")]
    pub resolver_identity: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SCIDD_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds, per resolver call and per download.
    ///
    /// Set via SCIDD_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Largest artifact that will be downloaded.
    ///
    /// Set via SCIDD_MAX_DOWNLOAD_BYTES environment variable.
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,

    /// Retries of transient resolver failures.
    ///
    /// Set via SCIDD_MAX_RETRIES environment variable.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each attempt.
    ///
    /// Set via SCIDD_RETRY_BASE_DELAY_MS environment variable.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Whether cached artifacts are checked against their recorded checksum.
    ///
    /// Set via SCIDD_VERIFY_CHECKSUMS environment variable.
    #[serde(default = "default_true")]
    pub verify_checksums: bool,
}

/// `$HOME/.scidd_cache`, or `./.scidd_cache` when there is no home directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".scidd_cache")
}

fn default_resolver_identity() -> String {
    "scidd-rest".into()
}

fn default_user_agent() -> String {
    "scidd/0.1".into()
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_max_download_bytes() -> u64 {
    4 * 1024 * 1024 * 1024 // 4GiB
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    250
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            resolver_url: None,
            resolver_identity: default_resolver_identity(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_download_bytes: default_max_download_bytes(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            verify_checksums: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SCIDD_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SCIDD_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Resolver base URL (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no resolver URL is configured, or
    /// `ConfigError::Invalid` if it does not parse.
    pub fn require_resolver_url(&self) -> Result<Url, ConfigError> {
        let raw = self.resolver_url.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "resolver_url".into(),
            hint: "Set SCIDD_RESOLVER_URL environment variable".into(),
        })?;
        Url::parse(raw).map_err(|e| ConfigError::Invalid { field: "resolver_url".into(), reason: e.to_string() })
    }
}
