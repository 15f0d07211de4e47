//! Analysis backend error types.

use thiserror::Error;

use crate::sanitize::{redact_url, truncate_body};

/// Errors returned by calls to the analysis backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The backend could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The backend answered with a non-success status code.
    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The configured base URL or a derived endpoint is not a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl ApiError {
    /// Builds a status error, truncating the body.
    pub fn status(status: u16, body: &str) -> Self {
        ApiError::Status {
            status,
            body: truncate_body(body),
        }
    }

    /// Transport failures are worth retrying; everything the backend
    /// actually answered is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Connection(_) | ApiError::Timeout)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest includes the URL in its message; keep credentials out.
        let err = err.without_url();
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_builder() {
            ApiError::InvalidUrl(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::status(status.as_u16(), &err.to_string())
        } else {
            ApiError::Connection(err.to_string())
        }
    }
}

/// Formats an endpoint for log output.
pub(crate) fn loggable_url(url: &reqwest::Url) -> String {
    redact_url(url.as_str())
}

/// Result type for backend calls.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ApiError::Connection("refused".into()).is_retryable());
        assert!(ApiError::Timeout.is_retryable());
        assert!(!ApiError::status(500, "boom").is_retryable());
        assert!(!ApiError::Decode("bad json".into()).is_retryable());
        assert!(!ApiError::InvalidUrl("x".into()).is_retryable());
    }

    #[test]
    fn test_status_body_truncated() {
        let err = ApiError::status(502, &"z".repeat(1000));
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 502);
                assert!(body.len() < 300);
                assert!(body.ends_with("(truncated)"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ApiError::status(404, "job not found").to_string(),
            "Backend returned HTTP 404: job not found"
        );
    }
}
