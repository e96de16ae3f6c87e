//! Analyzed video models and the persisted record schema.
//!
//! The same logical schema is used by the primary and the local store:
//! `{id, name, filePath, analysisData, frameRefs[]}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::frame::{Keyframe, JPEG_MIME_TYPE};
use crate::transcript::TranscriptSegment;

/// Identifier assigned by the store that accepted a video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
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

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Analysis of a single submitted frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAnalysis {
    /// Index of the frame in the submitted request
    #[serde(default, alias = "index", alias = "frame")]
    pub frame_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(alias = "analysis", alias = "content")]
    pub description: String,
}

/// Structured output of the content-understanding service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisData {
    pub summary: String,
    #[serde(default)]
    pub frame_analyses: Vec<FrameAnalysis>,
}

/// Stored reference to a keyframe image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRef {
    pub timestamp: f64,
    pub mime_type: String,
    /// Base64-encoded image bytes
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_context: Option<String>,
}

impl From<&Keyframe> for FrameRef {
    fn from(frame: &Keyframe) -> Self {
        Self {
            timestamp: frame.timestamp,
            mime_type: JPEG_MIME_TYPE.to_string(),
            data: frame.image_base64(),
            subtitle_context: frame.subtitle_context.clone(),
        }
    }
}

/// Final result of processing a submission, before a store assigns its ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedVideo {
    pub name: String,
    pub analysis_data: AnalysisData,
    #[serde(default)]
    pub frame_refs: Vec<FrameRef>,
    #[serde(default)]
    pub transcript: Vec<TranscriptSegment>,
    pub created_at: DateTime<Utc>,
}

impl AnalyzedVideo {
    pub fn new(
        name: impl Into<String>,
        analysis: AnalysisData,
        frames: &[Keyframe],
        transcript: Vec<TranscriptSegment>,
    ) -> Self {
        Self {
            name: name.into(),
            analysis_data: analysis,
            frame_refs: frames.iter().map(FrameRef::from).collect(),
            transcript,
            created_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> &str {
        &self.analysis_data.summary
    }

    /// Case-insensitive match against name and summary.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&query)
            || self.analysis_data.summary.to_lowercase().contains(&query)
    }
}

/// Persisted video as returned by either store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: VideoId,
    /// Location of the original upload, if it was stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(flatten)]
    pub video: AnalyzedVideo,
}

impl VideoRecord {
    pub fn new(id: VideoId, file_path: Option<String>, video: AnalyzedVideo) -> Self {
        Self {
            id,
            file_path,
            video,
        }
    }

    pub fn name(&self) -> &str {
        &self.video.name
    }
}
