//! Request signatures and resolver responses.
//!
//! A [`RequestSignature`] is the key of the API-response cache. Its canonical
//! form must be byte-for-byte reproducible across processes, so it is built
//! from sorted maps only.

use crate::Identifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

/// Deterministic description of one logical resolver request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSignature {
    resolver: String,
    identifier: String,
    #[serde(default)]
    params: BTreeMap<String, String>,
}

impl RequestSignature {
    pub fn new(resolver_identity: &str, identifier: &Identifier) -> Self {
        Self { resolver: resolver_identity.to_string(), identifier: identifier.normalized_string(), params: BTreeMap::new() }
    }

    /// Add a resolver-specific parameter. Order of insertion does not matter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn resolver(&self) -> &str {
        &self.resolver
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Canonical serialization: a compact JSON array
    /// `[resolver, identifier, {params...}]` with sorted parameter keys.
    pub fn canonical(&self) -> String {
        serde_json::json!([self.resolver, self.identifier, self.params]).to_string()
    }

    /// SHA-256 of the canonical form, hex encoded.
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Metadata a resolver returns for an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ResolverResponse {
    /// Where the resource can be retrieved.
    pub url: Url,
    /// Size in bytes, if the resolver knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// SHA-256 of the resource bytes (hex), if the resolver knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Safe to reuse indefinitely. Volatile responses (e.g. signed URLs
    /// with an expiry) are never persisted.
    pub idempotent: bool,
    /// Resolver-specific extras, e.g. the matches of a search.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ResolverResponse {
    pub fn idempotent(url: Url) -> Self {
        Self { url, size: None, checksum: None, content_type: None, idempotent: true, metadata: BTreeMap::new() }
    }

    pub fn volatile(url: Url) -> Self {
        Self { idempotent: false, ..Self::idempotent(url) }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Checksums are stored lowercased so comparisons are case-insensitive.
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into().to_ascii_lowercase());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// One persisted API-cache record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCacheRecord {
    pub signature: RequestSignature,
    pub response: ResolverResponse,
    pub captured_at: DateTime<Utc>,
}
