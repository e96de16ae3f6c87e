//! Transcript segments.

use serde::{Deserialize, Serialize};

/// A time-stamped span of recognized speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Whether the segment intersects the closed window `[from, to]`.
    pub fn overlaps(&self, from: f64, to: f64) -> bool {
        self.start <= to && self.end >= from
    }
}
