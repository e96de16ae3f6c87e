//! Media error type.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// Failures while probing or sampling a video. Each one fails only the
/// submission that owns the file.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg is not installed or not on PATH")]
    FfmpegNotFound,

    #[error("ffprobe is not installed or not on PATH")]
    FfprobeNotFound,

    #[error("ffmpeg exited with status {exit_code:?}")]
    FfmpegFailed {
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("seek to {timestamp:.3}s did not finish within {timeout_secs}s")]
    SeekTimeout { timestamp: f64, timeout_secs: u64 },

    #[error("ffmpeg did not finish within {0}s")]
    Timeout(u64),

    #[error("no such video file: {0}")]
    FileNotFound(PathBuf),

    #[error("not a usable video: {0}")]
    InvalidVideo(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed ffprobe output: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn ffmpeg_failed(exit_code: Option<i32>, stderr: Option<String>) -> Self {
        Self::FfmpegFailed { exit_code, stderr }
    }
}
