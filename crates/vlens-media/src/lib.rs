//! Frame extraction for vlens.
//!
//! This crate provides:
//! - FFmpeg command building and execution with timeouts
//! - Video probing via FFprobe
//! - A `FrameDecoder` seam with an FFmpeg-backed implementation
//! - Evenly spaced sampling with downscale and JPEG encoding
//! - Difference-hash fingerprints and keyframe deduplication

pub mod command;
pub mod decoder;
pub mod dedup;
pub mod error;
pub mod hash;
pub mod probe;
pub mod sampler;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use decoder::{FfmpegDecoder, FrameDecoder};
pub use dedup::{deduplicate, DedupDecision, KeyframeDeduplicator, DEFAULT_THRESHOLD};
pub use error::{MediaError, MediaResult};
pub use hash::{dhash, DEFAULT_HASH_SIZE};
pub use probe::{probe_video, VideoInfo};
pub use sampler::{encode_frame, sample_timestamps, FrameSampler, SamplerConfig};
