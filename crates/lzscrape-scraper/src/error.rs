use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("invalid curl capture: {reason}")]
    InvalidCapture { reason: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("session rejected by {url}: {reason}")]
    AuthExpired { url: String, reason: String },

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("schema mismatch in {context}: {reason}")]
    SchemaMismatch { context: String, reason: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ScraperError {
    /// `true` when the error means the captured session can no longer be used.
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ScraperError::AuthExpired { .. })
    }

    pub(crate) fn invalid_capture(reason: impl Into<String>) -> Self {
        ScraperError::InvalidCapture {
            reason: reason.into(),
        }
    }
}
