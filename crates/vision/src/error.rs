use std::time::Duration;

use indicator::SchemaError;
use thiserror::Error;

/// Errors surfaced by the vision adapter.
///
/// Every variant is an upstream-model failure from the caller's point of
/// view; [`is_retryable`](VisionError::is_retryable) separates transient
/// transport problems from replies that will not improve on a second try.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VisionError {
    /// Configuration is inconsistent (missing endpoint, missing key, zero timeout).
    #[error("invalid vision config: {0}")]
    InvalidConfig(String),
    /// The request never produced an HTTP response (DNS, connect, reset).
    #[error("model request failed: {0}")]
    Request(String),
    /// The provider answered with a non-success status.
    #[error("model provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// No reply within the configured bound.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    /// The provider envelope or the reply text could not be parsed.
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
    /// The reply parsed but does not satisfy the indicator schema.
    #[error("model reply violates indicator schema: {0}")]
    Schema(#[from] SchemaError),
}

impl VisionError {
    /// Whether a second attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            VisionError::Request(_) | VisionError::Timeout(_) => true,
            VisionError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            VisionError::InvalidConfig(_)
            | VisionError::InvalidResponse(_)
            | VisionError::Schema(_) => false,
        }
    }

    /// Short machine-readable kind for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            VisionError::InvalidConfig(_) => "invalid_config",
            VisionError::Request(_) => "request",
            VisionError::Http { .. } => "http",
            VisionError::Timeout(_) => "timeout",
            VisionError::InvalidResponse(_) => "invalid_response",
            VisionError::Schema(_) => "schema",
        }
    }
}

impl From<reqwest::Error> for VisionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured bound; zero marks "client-side".
            VisionError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            VisionError::InvalidResponse(err.to_string())
        } else {
            VisionError::Request(err.to_string())
        }
    }
}
