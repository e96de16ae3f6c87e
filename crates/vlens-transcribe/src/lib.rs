//! Speech transcription for vlens.
//!
//! Uploads a submission's media to the recognition server, follows the job's
//! server-sent event stream to a single terminal outcome, and attaches the
//! transcript text surrounding each keyframe.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod subtitles;


pub use client::{HttpTranscriptionClient, TranscriptionBackend};
pub use config::TranscriptionConfig;
pub use coordinator::{
    await_outcome, join_segments, TranscriptionCoordinator, TranscriptionOutcome,
    TranscriptionReport,
};
pub use error::{TranscribeError, TranscribeResult};
pub use events::{event_stream, EventSubscription, SseDecoder, SseFrame, TranscriptionEvent};
pub use subtitles::{to_srt, to_vtt, SubtitleFormat};
