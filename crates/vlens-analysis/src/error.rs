//! Analysis error types.

use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Payload of {size_bytes} bytes with {frame_count} frame(s) exceeds budget of {budget} bytes")]
    PayloadTooLarge {
        size_bytes: usize,
        frame_count: usize,
        budget: usize,
    },

    #[error("Failed to parse analysis response: {0}")]
    Parse(String),

    #[error("Analysis response does not match schema: {0}")]
    SchemaInvalid(String),

    #[error("Analysis service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnalysisError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn schema_invalid(message: impl Into<String>) -> Self {
        Self::SchemaInvalid(message.into())
    }

    /// Transport problems are retried; content problems never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalysisError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AnalysisError::Service { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the failure came from the wire rather than the content.
    pub fn is_transport(&self) -> bool {
        matches!(self, AnalysisError::Network(_) | AnalysisError::Service { .. })
    }
}
