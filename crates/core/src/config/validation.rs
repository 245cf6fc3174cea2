//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::resolver::validate_resolver_identity;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 10 minutes
    /// - `max_download_bytes` is 0
    /// - `max_retries` exceeds 10
    /// - `retry_base_delay_ms` is 0 or exceeds one minute
    /// - `user_agent` is empty
    /// - `resolver_identity` is not usable as a cache path component
    /// - `resolver_url` is set but is not an http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 600_000 {
            return Err(invalid("timeout_ms", "must not exceed 10 minutes (600000ms)"));
        }

        if self.max_download_bytes == 0 {
            return Err(invalid("max_download_bytes", "must be greater than 0"));
        }

        if self.max_retries > 10 {
            return Err(invalid("max_retries", "must not exceed 10"));
        }

        if !(1..=60_000).contains(&self.retry_base_delay_ms) {
            return Err(invalid("retry_base_delay_ms", "must be between 1 and 60000"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        validate_resolver_identity(&self.resolver_identity).map_err(|e| invalid("resolver_identity", e.to_string()))?;

        if let Some(raw) = &self.resolver_url {
            let url = url::Url::parse(raw).map_err(|e| invalid("resolver_url", e.to_string()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid("resolver_url", format!("unsupported scheme '{}'", url.scheme())));
            }
        }

        if self.cache_dir.is_relative() {
            tracing::warn!(
                cache_dir = %self.cache_dir.display(),
                "cache_dir is relative; artifacts will land under the working directory"
            );
        }

        Ok(())
    }
}
