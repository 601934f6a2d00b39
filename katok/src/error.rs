//! Error types.

use thiserror::Error;

/// The main error type for katok operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network-related error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Backend returned an error response.
    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },

    /// Requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse response data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Operation requires a logged-in session but none was provided.
    #[error("Authentication required")]
    AuthRequired,

    /// Invalid argument passed to an API method.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Cache storage error.
    #[error("Cache error: {0}")]
    Cache(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// STOMP protocol error (ERROR frame or malformed frame).
    #[error("STOMP error: {0}")]
    Stomp(String),

    /// An operation did not complete in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The session or channel has been closed.
    #[error("Closed: {0}")]
    Closed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(e))
    }
}

impl Error {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create a STOMP protocol error.
    pub fn stomp(msg: impl Into<String>) -> Self {
        Error::Stomp(msg.into())
    }

    /// Check if this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout(_) | Error::WebSocket(_) => true,
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Error::AuthRequired => true,
            Error::Api { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

/// Result type alias for katok operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::api(400, "bad request");
        assert_eq!(format!("{}", e), "API error [400]: bad request");
    }

    #[test]
    fn test_retryable() {
        assert!(Error::api(503, "unavailable").is_retryable());
        assert!(Error::Timeout("push connect".into()).is_retryable());
        assert!(!Error::api(400, "bad").is_retryable());
        assert!(!Error::InvalidArgument("empty".into()).is_retryable());
    }

    #[test]
    fn test_auth_error() {
        assert!(Error::AuthRequired.is_auth_error());
        assert!(Error::api(401, "expired").is_auth_error());
        assert!(!Error::NotFound("room 3".into()).is_auth_error());
    }
}
