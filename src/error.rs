//! Error type shared by the Groq and Notion HTTP clients.
//!
//! Pipeline stages return `Box<dyn Error>` and bubble these up with `?`;
//! the retry decorator in [`crate::api`] inspects them to decide whether
//! another attempt is worthwhile.

use thiserror::Error;

/// Failure talking to a remote API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing API key, database id, or an invalid client setting.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection refused, DNS failure, timeout.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with HTTP 429.
    #[error("rate limited (HTTP 429): {0}")]
    RateLimited(String),

    /// Any other non-2xx answer.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body did not have the shape we expected.
    #[error("parse error: {0}")]
    Parse(String),

    /// A completion came back without any message content.
    #[error("empty response from {0}")]
    EmptyResponse(&'static str),
}

impl ApiError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::RateLimited(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Map a `reqwest` transport error.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Parse(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }

    /// Build the error for a non-success status code and its body.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            ApiError::RateLimited(body)
        } else {
            ApiError::Status {
                status: status.as_u16(),
                body,
            }
        }
    }
}
