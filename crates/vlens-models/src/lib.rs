//! Shared data models for the vlens pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Submissions and their lifecycle states
//! - Sampled frames, fingerprints and keyframes
//! - Transcript segments
//! - Analyzed videos and the persisted store record

pub mod fingerprint;
pub mod frame;
pub mod submission;
pub mod transcript;
pub mod video;

// Re-export common types
pub use fingerprint::Fingerprint;
pub use frame::{CandidateFrame, Keyframe, JPEG_MIME_TYPE};
pub use submission::{
    ContentKey, FailureReport, SubmissionId, SubmissionState, SubmissionStatus, VideoSubmission,
};
pub use transcript::TranscriptSegment;
pub use video::{AnalysisData, AnalyzedVideo, FrameAnalysis, FrameRef, VideoId, VideoRecord};
