//! Transcription client error types.

use thiserror::Error;

pub type TranscribeResult<T> = Result<T, TranscribeError>;

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("Transcription service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Transcription service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscribeError {
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            502..=504 => TranscribeError::ServiceUnavailable(body),
            _ => TranscribeError::Service { status, body },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranscribeError::ServiceUnavailable(_) | TranscribeError::Network(_)
        )
    }
}
