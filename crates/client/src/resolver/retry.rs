//! Bounded exponential backoff for resolver requests.
//!
//! Only failures classified as transient (timeouts, connection errors, 408,
//! 429 and 5xx) are retried. Everything else is returned on the first attempt.

use scidd_core::Error;
use scidd_core::config::AppConfig;
use std::future::Future;
use std::time::Duration;

/// Outcome of a single failed attempt.
#[derive(Debug)]
pub enum AttemptError {
    /// Worth retrying; the message becomes the terminal error if retries run out.
    Transient(String),
    /// Returned as-is.
    Terminal(Error),
}

/// Retry schedule: `base_delay`, `2 * base_delay`, ... capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay: Duration::from_millis(250), max_delay: Duration::from_secs(30) }
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(config: &AppConfig) -> Self {
        Self { max_retries: config.max_retries, base_delay: config.retry_base_delay(), ..Default::default() }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self { max_retries: 0, ..Default::default() }
    }

    /// Delay before retry number `retry` (zero-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails terminally, or retries run out.
    ///
    /// Exhausted retries surface as a single `Resolution` error.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(AttemptError::Terminal(e)) => return Err(e),
                Err(AttemptError::Transient(msg)) if retry < self.max_retries => {
                    let delay = self.delay_for(retry);
                    retry += 1;
                    tracing::warn!(
                        operation = what,
                        attempt = retry,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %msg,
                        "transient resolver failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(AttemptError::Transient(msg)) => {
                    return Err(Error::Resolution(format!("{what}: {msg} (after {} attempts)", retry + 1)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy { max_retries, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(4) }
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(1000),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for(1), Duration::from_millis(400));
        assert_eq!(policy.delay_for(2), Duration::from_millis(800));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_from_app_config() {
        let config = AppConfig { max_retries: 7, retry_base_delay_ms: 10, ..Default::default() };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_retries, 7);
        assert_eq!(policy.base_delay, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_exhausts_all_attempts_on_transient_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = fast(3)
            .run("resolve", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AttemptError::Transient("connection refused".into()))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(Error::Resolution(msg)) => assert!(msg.contains("after 4 attempts"), "{msg}"),
            other => panic!("expected Resolution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_terminal_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = fast(3)
            .run("resolve", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AttemptError::Terminal(Error::NotFound("gone".into())))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = fast(3)
            .run("resolve", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AttemptError::Transient("503".into()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = RetryPolicy::none()
            .run("resolve", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AttemptError::Transient("timeout".into()))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(Error::Resolution(_))));
    }
}
