//! Bounded retry with exponential backoff for backend calls.
//!
//! The default policy makes exactly one attempt. Raising `max_retries` opts
//! into `base_delay * 2^attempt` backoff between attempts, applied only to
//! failures the caller marks as retryable.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::RetrySettings;
use crate::error::Error;

/// A failed attempt and whether another one could help (timeouts, 429, 5xx).
#[derive(Debug)]
pub struct Failure {
    pub error: Error,
    pub retryable: bool,
}

impl Failure {
    pub fn transient(error: Error) -> Self { Self { error, retryable: true } }
    pub fn permanent(error: Error) -> Self { Self { error, retryable: false } }
}

/// HTTP statuses that signal a transient backend condition.
pub fn is_retryable_status(status: u16) -> bool { status == 408 || status == 429 || (500..=599).contains(&status) }

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self { Self::single_shot() }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self { Self { max_retries: s.max_retries, base_delay: Duration::from_millis(s.base_delay_ms) } }
}

impl RetryPolicy {
    pub fn single_shot() -> Self { Self { max_retries: 0, base_delay: Duration::from_millis(500) } }

    pub fn delay_for(&self, attempt: u32) -> Duration { self.base_delay.saturating_mul(2u32.saturating_pow(attempt)) }

    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> crate::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, Failure>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(f) if f.retryable && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    warn!(call = label, attempt = attempt + 1, ?delay, error = %f.error, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(f) => return Err(f.error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn single_shot_does_not_retry() {
        let calls = AtomicU32::new(0);
        let res: crate::Result<()> = RetryPolicy::single_shot()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::transient(Error::CompletionService("boom".into()))) }
            })
            .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { max_retries: 3, base_delay: Duration::from_millis(1) };
        let res = policy
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err(Failure::transient(Error::EmbeddingService("503".into()))) } else { Ok(n) } }
            })
            .await
            .expect("eventually succeeds");
        assert_eq!(res, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_stop_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { max_retries: 5, base_delay: Duration::from_millis(1) };
        let res: crate::Result<()> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::permanent(Error::CompletionService("400".into()))) }
            })
            .await;
        assert!(matches!(res, Err(Error::CompletionService(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy { max_retries: 3, base_delay: Duration::from_millis(100) };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }
}
