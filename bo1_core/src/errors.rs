//! Core error types for the streaming client.
//!
//! Only transport failures move the connection state machine; every other
//! variant is reported through logs or the `on_error` hook.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP error details for a rejected stream request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorInfo {
    /// HTTP status code (e.g., 404, 500)
    pub status: u16,
    /// Request URL
    pub url: String,
    /// Error message
    pub message: String,
    /// First 200 chars of response body (for debugging)
    pub body_snippet: Option<String>,
}

impl std::fmt::Display for HttpErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {} for {}: {}", self.status, self.url, self.message)?;
        if let Some(ref snippet) = self.body_snippet {
            let truncated: String = snippet.chars().take(200).collect();
            write!(f, " | body[0:200]={}", truncated)?;
        }
        Ok(())
    }
}

/// Out-of-order sequence number on a single connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceViolationInfo {
    pub session_id: String,
    /// Highest sequence already received on this connection.
    pub previous: u64,
    /// The sequence that did not advance past `previous`.
    pub received: u64,
}

impl std::fmt::Display for SequenceViolationInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sequence violation in session {}: received {} after {}",
            self.session_id, self.received, self.previous
        )
    }
}

/// Unified error enum for the streaming client.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid input provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// URL parsing failed
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// HTTP request failed (network layer)
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP response error (4xx/5xx)
    #[error("{0}")]
    HttpResponse(HttpErrorInfo),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Timeout error
    #[error("timeout: {0}")]
    Timeout(String),

    /// Protocol/wire format error
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A frame's payload could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// The server ended the stream without a terminal event
    #[error("stream closed by server")]
    StreamClosed,

    /// Sequence numbers went backwards or repeated on one connection
    #[error("{0}")]
    SequenceViolation(SequenceViolationInfo),

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Create an HTTP response error.
    pub fn http_response(status: u16, url: &str, message: &str, body: Option<&str>) -> Self {
        CoreError::HttpResponse(HttpErrorInfo {
            status,
            url: url.to_string(),
            message: message.to_string(),
            body_snippet: body.map(|s| s.chars().take(200).collect()),
        })
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        CoreError::Config(message.into())
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        CoreError::Timeout(message.into())
    }

    /// Create a sequence violation error.
    pub fn sequence_violation(session_id: &str, previous: u64, received: u64) -> Self {
        CoreError::SequenceViolation(SequenceViolationInfo {
            session_id: session_id.to_string(),
            previous,
            received,
        })
    }

    /// Check if reconnecting after this error can succeed.
    ///
    /// Client errors (4xx) other than 408 and 429 mean the session is gone or
    /// the caller is not allowed to read it; retrying would only hammer the
    /// backend.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::HttpResponse(info) => is_retryable_status(info.status),
            CoreError::Http(e) => e.status().map(|s| is_retryable_status(s.as_u16())).unwrap_or(true),
            CoreError::Timeout(_) | CoreError::Protocol(_) | CoreError::StreamClosed => true,
            _ => false,
        }
    }

    /// Get HTTP status code if this is an HTTP error.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            CoreError::HttpResponse(info) => Some(info.status),
            CoreError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = CoreError::http_response(
            404,
            "http://localhost:8000/api/v1/sessions/x/stream",
            "session not found",
            None,
        );
        let msg = format!("{}", err);
        assert!(msg.contains("404"));
        assert!(msg.contains("sessions/x/stream"));
    }

    #[test]
    fn test_retryable() {
        let err_500 = CoreError::http_response(503, "http://localhost", "unavailable", None);
        assert!(err_500.is_retryable());

        let err_429 = CoreError::http_response(429, "http://localhost", "slow down", None);
        assert!(err_429.is_retryable());

        let err_404 = CoreError::http_response(404, "http://localhost", "not found", None);
        assert!(!err_404.is_retryable());

        let err_401 = CoreError::http_response(401, "http://localhost", "unauthorized", None);
        assert!(!err_401.is_retryable());

        assert!(CoreError::StreamClosed.is_retryable());
        assert!(CoreError::timeout("idle").is_retryable());
        assert!(!CoreError::config("bad").is_retryable());
        assert!(!CoreError::InvalidInput("empty".into()).is_retryable());
    }

    #[test]
    fn test_http_status() {
        let err = CoreError::http_response(403, "http://localhost", "forbidden", None);
        assert_eq!(err.http_status(), Some(403));
        assert_eq!(CoreError::StreamClosed.http_status(), None);
    }

    #[test]
    fn test_sequence_violation_display() {
        let err = CoreError::sequence_violation("sess-1", 7, 7);
        let msg = err.to_string();
        assert!(msg.contains("sess-1"));
        assert!(msg.contains("received 7 after 7"));
    }
}
