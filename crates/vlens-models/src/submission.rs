//! Submission models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::video::VideoId;

/// Unique identifier for an ingested submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl SubmissionId {
    /// Generate a new random submission ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubmissionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of a logical file for admission deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentKey {
    pub name: String,
    pub size_bytes: u64,
}

impl ContentKey {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.size_bytes)
    }
}

/// A raw video waiting for, or undergoing, processing.
#[derive(Debug, Clone)]
pub struct VideoSubmission {
    pub id: SubmissionId,
    /// Original file name
    pub name: String,
    /// Size of the source in bytes
    pub size_bytes: u64,
    /// Location of the uploaded source bytes
    pub source_path: PathBuf,
    pub received_at: DateTime<Utc>,
}

impl VideoSubmission {
    pub fn new(name: impl Into<String>, size_bytes: u64, source_path: impl Into<PathBuf>) -> Self {
        Self {
            id: SubmissionId::new(),
            name: name.into(),
            size_bytes,
            source_path: source_path.into(),
            received_at: Utc::now(),
        }
    }

    pub fn content_key(&self) -> ContentKey {
        ContentKey::new(self.name.clone(), self.size_bytes)
    }
}

/// Lifecycle of a submission.
///
/// `Queued → Extracting → AwaitingTranscription → Analyzing → Saving → Complete`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Queued,
    Extracting,
    AwaitingTranscription,
    Analyzing,
    Saving,
    Complete,
    Failed,
}

impl SubmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Queued => "queued",
            SubmissionState::Extracting => "extracting",
            SubmissionState::AwaitingTranscription => "awaiting_transcription",
            SubmissionState::Analyzing => "analyzing",
            SubmissionState::Saving => "saving",
            SubmissionState::Complete => "complete",
            SubmissionState::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionState::Complete | SubmissionState::Failed)
    }

    /// Check whether a worker currently holds the submission.
    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != SubmissionState::Queued
    }

    /// The state following this one on the success path.
    pub fn next(&self) -> Option<SubmissionState> {
        match self {
            SubmissionState::Queued => Some(SubmissionState::Extracting),
            SubmissionState::Extracting => Some(SubmissionState::AwaitingTranscription),
            SubmissionState::AwaitingTranscription => Some(SubmissionState::Analyzing),
            SubmissionState::Analyzing => Some(SubmissionState::Saving),
            SubmissionState::Saving => Some(SubmissionState::Complete),
            SubmissionState::Complete | SubmissionState::Failed => None,
        }
    }

    /// Whether `self → to` is a legal transition.
    pub fn can_transition_to(&self, to: SubmissionState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == SubmissionState::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-visible description of a fatal submission failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub submission_id: SubmissionId,
    pub file_name: String,
    pub message: String,
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.file_name, self.submission_id, self.message)
    }
}

/// Snapshot of a submission's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStatus {
    pub id: SubmissionId,
    pub name: String,
    pub size_bytes: u64,
    pub state: SubmissionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureReport>,
    /// Stored video ID once saved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionStatus {
    pub fn queued(submission: &VideoSubmission) -> Self {
        Self {
            id: submission.id.clone(),
            name: submission.name.clone(),
            size_bytes: submission.size_bytes,
            state: SubmissionState::Queued,
            error: None,
            video_id: None,
            received_at: submission.received_at,
            updated_at: Utc::now(),
        }
    }
}
