//! Retry policy for listing requests.
//!
//! Network failures get a small number of immediate re-attempts. A 429 gets
//! one retry after waiting out `Retry-After` (capped). Everything else,
//! including an expired session, is returned on the first failure.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Longest we will honour a server's `Retry-After`.
pub(crate) const MAX_RATE_LIMIT_WAIT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after a network failure.
    pub network_max_retries: u32,
    /// Wait used when a 429 carries no `Retry-After`.
    pub rate_limit_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            network_max_retries: 2,
            rate_limit_backoff_secs: 10,
        }
    }
}

/// Runs `operation` under `policy`.
///
/// At most `1 + network_max_retries + 1` attempts are made: the network
/// budget and the single rate-limit retry are tracked separately.
pub(crate) async fn retry_transient<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut network_retries = 0u32;
    let mut rate_limit_retried = false;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(ScraperError::Network(err)) if network_retries < policy.network_max_retries => {
                network_retries += 1;
                tracing::warn!(
                    attempt = network_retries,
                    max_retries = policy.network_max_retries,
                    error = %err,
                    "network error, retrying"
                );
            }
            Err(ScraperError::RateLimited {
                domain,
                retry_after_secs,
            }) if !rate_limit_retried => {
                rate_limit_retried = true;
                let wait_secs = retry_after_secs.min(MAX_RATE_LIMIT_WAIT_SECS);
                tracing::warn!(
                    domain = %domain,
                    wait_secs,
                    "rate limited, backing off before one retry"
                );
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
            }
            Err(err) => return Err(err),
        }
    }
}
