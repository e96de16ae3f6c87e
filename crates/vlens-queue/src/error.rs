//! Queue error types.

use thiserror::Error;
use vlens_models::SubmissionState;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue is full ({capacity} submissions waiting)")]
    Full { capacity: usize },

    #[error("Submission not found: {0}")]
    NotFound(String),

    #[error("Illegal transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: SubmissionState,
        to: SubmissionState,
    },

    #[error("Submission already finished: {0}")]
    AlreadyFinished(String),
}

impl QueueError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }
}
