//! The resolver contract.
//!
//! A resolver turns an [`Identifier`] into a [`ResolverResponse`] (at minimum
//! a URL). Concrete resolvers live outside this crate; they only need to
//! implement [`Resolver`].
//!
//! ### Contract
//!
//! - `resolve` must be safe to call repeatedly with the same identifier.
//! - Implementations should consult the API-response cache of the supplied
//!   cache manager before doing network I/O, and store the response afterwards
//!   only when it is idempotent. [`resolve_with_cache`] does both.
//! - Retries of transient failures happen inside `resolve`; a caller sees
//!   either a response or exactly one terminal error.

mod signature;

pub use signature::{ApiCacheRecord, RequestSignature, ResolverResponse};

use crate::cache::CacheManager;
use crate::{Error, Identifier};
use async_trait::async_trait;
use std::future::Future;

/// Longest accepted resolver identity.
const MAX_IDENTITY_LEN: usize = 64;

/// Translates identifiers into retrievable locations.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Stable name used in cache-key derivation, so two resolvers for the
    /// same domain never collide in the cache. Must satisfy
    /// [`validate_resolver_identity`].
    fn identity(&self) -> &str;

    /// Resolve `identifier`.
    ///
    /// # Errors
    ///
    /// `Resolution` for transport failures, `NotFound` when the resource does
    /// not exist, `AmbiguousResolution` when no single resource matches.
    async fn resolve(&self, identifier: &Identifier, cache: &dyn CacheManager) -> Result<ResolverResponse, Error>;

    /// Request signature for resolving `identifier` with this resolver.
    fn signature(&self, identifier: &Identifier) -> RequestSignature {
        RequestSignature::new(self.identity(), identifier)
    }
}

/// Answer from the API-response cache when possible, otherwise run `fetch`
/// and persist its response if it is idempotent.
///
/// A failure to persist is logged; the fetched response is still returned.
pub async fn resolve_with_cache<F, Fut>(
    cache: &dyn CacheManager, signature: &RequestSignature, fetch: F,
) -> Result<ResolverResponse, Error>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ResolverResponse, Error>>,
{
    let api_cache = cache.local_api_cache();

    if let Some(response) = api_cache.get(signature) {
        tracing::debug!(identifier = signature.identifier(), resolver = signature.resolver(), "API cache hit");
        return Ok(response);
    }

    let response = fetch().await?;

    if response.idempotent
        && let Err(e) = api_cache.put(signature, &response)
    {
        tracing::warn!(identifier = signature.identifier(), error = %e, "failed to persist resolver response");
    }

    Ok(response)
}

/// Check that a resolver identity is safe to use as a cache path component.
///
/// Identities match `[a-z0-9][a-z0-9._-]*` and are at most 64 characters, so
/// they can never name the reserved `.scidd` bookkeeping directory.
pub fn validate_resolver_identity(identity: &str) -> Result<(), Error> {
    let mut bytes = identity.bytes();
    let valid_first = bytes.next().is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    let valid_rest = bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'-'));

    if !valid_first || !valid_rest || identity.len() > MAX_IDENTITY_LEN {
        return Err(Error::InvalidInput(format!(
            "resolver identity '{identity}' must match [a-z0-9][a-z0-9._-]* (max {MAX_IDENTITY_LEN} chars)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FsCacheManager;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use url::Url;

    fn frame() -> Identifier {
        Identifier::parse("scidd:/astro/file/sdss/dr16/frame-g-006073-1-0025.fits").unwrap()
    }

    fn frame_url() -> Url {
        Url::parse("https://example.org/frame.fits").unwrap()
    }

    #[test]
    fn test_validate_resolver_identity() {
        for ok in ["trillian", "scidd-rest", "r2.v1", "a_b"] {
            assert!(validate_resolver_identity(ok).is_ok(), "{ok}");
        }
        for bad in ["", ".scidd", "Upper", "a/b", "-lead", "with space", "x".repeat(65).as_str()] {
            assert!(validate_resolver_identity(bad).is_err(), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_resolve_with_cache_reuses_idempotent_response() {
        let dir = TempDir::new().unwrap();
        let cache = FsCacheManager::new(dir.path());
        let sig = RequestSignature::new("stub", &frame());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let response = resolve_with_cache(&cache, &sig, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(ResolverResponse::idempotent(frame_url()))
            })
            .await
            .unwrap();
            assert_eq!(response.url, frame_url());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_with_cache_never_persists_volatile_response() {
        let dir = TempDir::new().unwrap();
        let cache = FsCacheManager::new(dir.path());
        let sig = RequestSignature::new("stub", &frame());
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            resolve_with_cache(&cache, &sig, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(ResolverResponse::volatile(frame_url()))
            })
            .await
            .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.local_api_cache().has(&sig));
    }

    #[tokio::test]
    async fn test_resolve_with_cache_propagates_errors() {
        let dir = TempDir::new().unwrap();
        let cache = FsCacheManager::new(dir.path());
        let sig = RequestSignature::new("stub", &frame());

        let result = resolve_with_cache(&cache, &sig, || async { Err(Error::NotFound("frame".into())) }).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(!cache.local_api_cache().has(&sig));
    }
}
