//! Structured submission logging.
//!
//! Every lifecycle line carries the submission ID and file name so one
//! submission can be followed through the pipeline.

use tracing::{error, info, warn, Span};
use vlens_models::{SubmissionId, SubmissionState, VideoSubmission};

/// Logger bound to one submission.
#[derive(Debug, Clone)]
pub struct SubmissionLogger {
    submission_id: String,
    file_name: String,
}

impl SubmissionLogger {
    pub fn new(submission: &VideoSubmission) -> Self {
        Self {
            submission_id: submission.id.to_string(),
            file_name: submission.name.clone(),
        }
    }

    pub fn from_parts(submission_id: &SubmissionId, file_name: &str) -> Self {
        Self {
            submission_id: submission_id.to_string(),
            file_name: file_name.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            submission_id = %self.submission_id,
            file_name = %self.file_name,
            "Submission started: {}", message
        );
    }

    /// Log entry into a pipeline stage.
    pub fn log_stage(&self, state: SubmissionState) {
        info!(
            submission_id = %self.submission_id,
            file_name = %self.file_name,
            stage = state.as_str(),
            "Submission stage: {}", state
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            submission_id = %self.submission_id,
            file_name = %self.file_name,
            "Submission progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            submission_id = %self.submission_id,
            file_name = %self.file_name,
            "Submission warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            submission_id = %self.submission_id,
            file_name = %self.file_name,
            "Submission failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            submission_id = %self.submission_id,
            file_name = %self.file_name,
            "Submission completed: {}", message
        );
    }

    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Span wrapping all work done for this submission.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "submission",
            submission_id = %self.submission_id,
            file_name = %self.file_name
        )
    }
}
