//! Error types for the compute module client

use thiserror::Error;

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur when talking to the job-issuing service
///
/// None of these are fatal to the dispatch loop; callers log them and move on.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network or protocol failure before a status was received
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The service answered with a non-success status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// Failed to parse or encode a body
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Trust material could not be turned into certificates
    #[error("Invalid trust store: {0}")]
    InvalidTrustStore(String),
}

impl TransportError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Status code carried by the error, when one is known
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            Self::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(status) if (400..500).contains(&status))
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(status) if status >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = TransportError::api_error(404, "missing");
        assert_eq!(err.status(), Some(404));
        assert!(err.is_client_error());
        assert!(!err.is_server_error());

        let err = TransportError::api_error(503, "unavailable");
        assert!(err.is_server_error());
        assert!(!err.is_client_error());

        let err = TransportError::ParseError("bad json".to_string());
        assert_eq!(err.status(), None);
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_display_includes_status_and_message() {
        let err = TransportError::api_error(500, "boom");
        assert_eq!(err.to_string(), "API error (status 500): boom");
    }
}
