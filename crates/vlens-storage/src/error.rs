//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage: {0}")]
    ConfigError(String),

    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("Primary store unavailable: {0}")]
    PrimaryUnavailable(String),

    #[error("Primary store returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Local store error: {0}")]
    Local(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn primary_unavailable(msg: impl Into<String>) -> Self {
        Self::PrimaryUnavailable(msg.into())
    }

    pub fn local(msg: impl Into<String>) -> Self {
        Self::Local(msg.into())
    }

    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            404 => Self::NotFound(body),
            502..=504 => Self::PrimaryUnavailable(body),
            _ => Self::Http { status, body },
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::PrimaryUnavailable(_) => true,
            StorageError::Http { status, .. } => *status == 429 || *status >= 500,
            StorageError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            StorageError::from_http_status(404, "gone"),
            StorageError::NotFound(_)
        ));
        let unavailable = StorageError::from_http_status(503, "down");
        assert!(matches!(unavailable, StorageError::PrimaryUnavailable(_)));
        assert!(unavailable.is_retryable());

        let bad = StorageError::from_http_status(400, "bad");
        assert!(!bad.is_retryable());
        assert!(StorageError::from_http_status(500, "oops").is_retryable());
    }
}
