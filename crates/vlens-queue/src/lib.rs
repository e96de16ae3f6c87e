//! In-process ingestion queue.
//!
//! This crate provides:
//! - Bounded FIFO admission with content-key dedup
//! - The per-submission state machine and user-visible status
//! - Cancellation signals for active submissions
//! - Status change notifications

pub mod error;
pub mod progress;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use progress::ProgressChannel;
pub use queue::{
    Admission, CancelOutcome, CancelSignal, Claim, IngestionQueue, QueueConfig, CANCELLED_MESSAGE,
};
