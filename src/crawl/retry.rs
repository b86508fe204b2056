//! Bounded retry around a single page visit

use crate::error::CrawlError;
use std::future::Future;

/// Attempts per page, the first one included
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Re-invokes a fallible operation while it fails with a retryable error
///
/// Retries happen immediately; pacing between pages is the caller's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` (called with the 1-based attempt number) until it succeeds,
    /// fails terminally, or the budget runs out.
    ///
    /// Exhausting the budget yields [`CrawlError::RetryExhausted`] wrapping the
    /// last failure. Non-retryable errors are returned as-is on first sight.
    pub async fn run<T, F, Fut>(&self, url: &str, mut op: F) -> Result<T, CrawlError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CrawlError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    tracing::warn!(url, attempt, error = %err, "page attempt failed");
                    if attempt >= self.max_attempts {
                        return Err(CrawlError::RetryExhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
