//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Submission timed out after {0}s")]
    Timeout(u64),

    /// Display text matches the queue's cancellation message.
    #[error("cancelled")]
    Cancelled,

    #[error("Media error: {0}")]
    Media(#[from] vlens_media::MediaError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] vlens_analysis::AnalysisError),

    #[error("Storage error: {0}")]
    Storage(#[from] vlens_storage::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] vlens_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    /// Whether the error reflects a fault rather than a user request.
    ///
    /// Either way the submission fails; this only drives logging and the
    /// outcome label.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, WorkerError::Cancelled)
    }

    /// Outcome label used in metrics.
    pub fn outcome(&self) -> &'static str {
        if self.is_fatal() {
            "failed"
        } else {
            "cancelled"
        }
    }
}
