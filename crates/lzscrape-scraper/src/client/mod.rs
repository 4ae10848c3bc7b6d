//! HTTP client that replays a captured browser session against a country's
//! listing endpoint.

mod fetch_all;

use std::time::Duration;

use lzscrape_core::CountryConfig;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use crate::capture::CapturedRequest;
use crate::error::ScraperError;
use crate::pagination::listing_url;
use crate::rate_limit::{retry_transient, RetryPolicy};

pub use fetch_all::{jittered, CategoryPages, FetchLimits};

/// Bodies shorter than this are scanned in full for auth markers; longer ones
/// only have their `ret` field checked.
const SHORT_BODY_BYTES: usize = 4096;

/// Replays a [`CapturedRequest`] with the listing URL swapped per page.
///
/// Classifies responses into typed errors: 401/403, HTML bodies and
/// configured marker strings become [`ScraperError::AuthExpired`]; 429
/// becomes [`ScraperError::RateLimited`].
pub struct CatalogClient {
    pub(super) client: Client,
    pub(super) policy: RetryPolicy,
}

impl CatalogClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Network`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, policy: RetryPolicy) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, policy })
    }

    /// Fetches one listing page for `query`, retrying transient failures
    /// according to the client's [`RetryPolicy`].
    ///
    /// # Errors
    ///
    /// - [`ScraperError::AuthExpired`]: 401/403, HTML body, or auth marker (not retried).
    /// - [`ScraperError::RateLimited`]: 429 persisted after one backed-off retry.
    /// - [`ScraperError::Network`]: connection failure or timeout after retries.
    /// - [`ScraperError::UnexpectedStatus`]: any other non-2xx status.
    /// - [`ScraperError::Deserialize`]: body is not JSON.
    /// - [`ScraperError::InvalidUrl`] / [`ScraperError::InvalidCapture`]: bad template or headers.
    pub async fn fetch_page(
        &self,
        capture: &CapturedRequest,
        country: &CountryConfig,
        query: &str,
        page: u32,
    ) -> Result<Value, ScraperError> {
        let url = listing_url(&country.url_template, query, page)?;
        let headers = capture.replay_headers()?;
        let method = Method::from_bytes(capture.method.as_bytes()).map_err(|e| {
            ScraperError::InvalidCapture {
                reason: format!("bad method '{}': {e}", capture.method),
            }
        })?;
        let policy = self.policy;

        retry_transient(policy, || {
            let url = url.clone();
            let headers = headers.clone();
            let method = method.clone();
            async move {
                let mut request = self.client.request(method, &url).headers(headers);
                if let Some(body) = &capture.body {
                    request = request.body(body.clone());
                }

                let response = request.send().await?;
                let status = response.status();

                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    return Err(ScraperError::AuthExpired {
                        url,
                        reason: format!("HTTP {}", status.as_u16()),
                    });
                }

                if status == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.trim().parse::<u64>().ok())
                        .unwrap_or(policy.rate_limit_backoff_secs);
                    return Err(ScraperError::RateLimited {
                        domain: country.domain.clone(),
                        retry_after_secs,
                    });
                }

                if !status.is_success() {
                    return Err(ScraperError::UnexpectedStatus {
                        status: status.as_u16(),
                        url,
                    });
                }

                let body = response.text().await?;
                classify_body(&body, &url, &country.auth_markers)
            }
        })
        .await
    }
}

/// Parses a 2xx body, rejecting blocked or challenged sessions.
pub(crate) fn classify_body(
    body: &str,
    url: &str,
    auth_markers: &[String],
) -> Result<Value, ScraperError> {
    if body.trim_start().starts_with('<') {
        return Err(ScraperError::AuthExpired {
            url: url.to_owned(),
            reason: "received HTML instead of JSON (blocked)".to_owned(),
        });
    }

    if body.len() <= SHORT_BODY_BYTES {
        if let Some(marker) = auth_markers.iter().find(|m| body.contains(m.as_str())) {
            return Err(ScraperError::AuthExpired {
                url: url.to_owned(),
                reason: format!("challenge marker {marker} in response"),
            });
        }
    }

    let value: Value = serde_json::from_str(body).map_err(|e| ScraperError::Deserialize {
        context: format!("listing page {url}"),
        source: e,
    })?;

    if let Some(ret) = value.get("ret") {
        let ret = ret.to_string();
        if let Some(marker) = auth_markers.iter().find(|m| ret.contains(m.as_str())) {
            return Err(ScraperError::AuthExpired {
                url: url.to_owned(),
                reason: format!("challenge marker {marker} in response"),
            });
        }
    }

    Ok(value)
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
