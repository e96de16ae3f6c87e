//! Transcription coordination.
//!
//! A transcript is an optional enrichment: every failure mode here degrades
//! to keyframe-only analysis instead of failing the submission.

use futures_util::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vlens_models::{Keyframe, TranscriptSegment};

use crate::client::TranscriptionBackend;
use crate::config::TranscriptionConfig;
use crate::events::{EventSubscription, TranscriptionEvent};

/// Terminal result of waiting on a transcription job.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionOutcome {
    Completed { segment_count: usize },
    /// The job finished but recognized no speech.
    CompletedEmpty,
    Failed(String),
    TimedOut,
}

impl TranscriptionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::CompletedEmpty => "no_speech",
            Self::Failed(_) => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Wait for the first terminal event, bounded by `timeout`.
///
/// Events after the first terminal one are never read. The subscription is
/// consumed and dropped on every path, closing the connection and the timer.
pub async fn await_outcome(mut events: EventSubscription, timeout: Duration) -> TranscriptionOutcome {
    let wait = async {
        while let Some(event) = events.next().await {
            match event {
                Ok(TranscriptionEvent::Connected) => debug!("Transcription stream connected"),
                Ok(TranscriptionEvent::Progress { stage, percent }) => {
                    debug!(stage = ?stage, percent = ?percent, "Transcription progress")
                }
                Ok(TranscriptionEvent::Complete { segment_count, .. }) => {
                    return if segment_count == 0 {
                        TranscriptionOutcome::CompletedEmpty
                    } else {
                        TranscriptionOutcome::Completed { segment_count }
                    };
                }
                Ok(TranscriptionEvent::Error { message }) => {
                    return TranscriptionOutcome::Failed(message);
                }
                Err(e) => return TranscriptionOutcome::Failed(e.to_string()),
            }
        }
        TranscriptionOutcome::Failed("event stream closed".to_string())
    };

    tokio::time::timeout(timeout, wait)
        .await
        .unwrap_or(TranscriptionOutcome::TimedOut)
}

/// Everything transcription contributed to one submission.
#[derive(Debug, Clone)]
pub struct TranscriptionReport {
    pub job_id: Option<String>,
    pub outcome: TranscriptionOutcome,
    pub keyframes: Vec<Keyframe>,
    pub transcript: Vec<TranscriptSegment>,
}

/// Drives upload, event wait and per-keyframe context attachment.
#[derive(Clone)]
pub struct TranscriptionCoordinator {
    backend: Arc<dyn TranscriptionBackend>,
    config: TranscriptionConfig,
}

impl TranscriptionCoordinator {
    pub fn new(backend: Arc<dyn TranscriptionBackend>, config: TranscriptionConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &TranscriptionConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn TranscriptionBackend> {
        &self.backend
    }

    /// Upload the source and wait for a terminal outcome.
    pub async fn transcribe(
        &self,
        file_name: &str,
        source: &Path,
    ) -> (Option<String>, TranscriptionOutcome) {
        let bytes = match tokio::fs::read(source).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return (
                    None,
                    TranscriptionOutcome::Failed(format!("failed to read source: {}", e)),
                )
            }
        };

        let job_id = match self.backend.upload(file_name, bytes).await {
            Ok(id) => id,
            Err(e) => return (None, TranscriptionOutcome::Failed(format!("upload failed: {}", e))),
        };

        let events = match self.backend.subscribe(&job_id).await {
            Ok(events) => events,
            Err(e) => {
                return (
                    Some(job_id),
                    TranscriptionOutcome::Failed(format!("subscribe failed: {}", e)),
                )
            }
        };

        let outcome = await_outcome(events, self.config.timeout).await;
        (Some(job_id), outcome)
    }

    /// Attach the text spoken around each keyframe.
    ///
    /// A failed lookup leaves that frame without context.
    pub async fn attach_context(&self, job_id: &str, keyframes: Vec<Keyframe>) -> Vec<Keyframe> {
        let window = self.config.context_window_secs;
        let mut attached = Vec::with_capacity(keyframes.len());

        for keyframe in keyframes {
            let context = match self.backend.subtitles_at(job_id, keyframe.timestamp, window).await {
                Ok(segments) => Some(join_segments(&segments)),
                Err(e) => {
                    warn!(
                        job_id,
                        timestamp = keyframe.timestamp,
                        "Subtitle lookup failed: {}",
                        e
                    );
                    None
                }
            };
            attached.push(keyframe.with_subtitle_context(context));
        }

        attached
    }

    /// Full transcription pass for one submission.
    pub async fn run(&self, file_name: &str, source: &Path, keyframes: Vec<Keyframe>) -> TranscriptionReport {
        let start = Instant::now();
        let (job_id, outcome) = self.transcribe(file_name, source).await;

        metrics::counter!("vlens_transcriptions_total", "outcome" => outcome.as_str())
            .increment(1);

        let (keyframes, transcript) = match (&outcome, &job_id) {
            (TranscriptionOutcome::Completed { segment_count }, Some(job_id)) => {
                info!(
                    job_id = %job_id,
                    segment_count,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Transcription completed"
                );
                let keyframes = self.attach_context(job_id, keyframes).await;
                let transcript = match self.backend.all_segments(job_id).await {
                    Ok(segments) => segments,
                    Err(e) => {
                        warn!(job_id = %job_id, "Failed to fetch transcript: {}", e);
                        Vec::new()
                    }
                };
                (keyframes, transcript)
            }
            (TranscriptionOutcome::CompletedEmpty, _) => {
                warn!(file_name, "Transcription found no speech; continuing without subtitles");
                (keyframes, Vec::new())
            }
            (TranscriptionOutcome::TimedOut, _) => {
                warn!(
                    file_name,
                    timeout_secs = self.config.timeout.as_secs(),
                    "Transcription timed out; continuing without subtitles"
                );
                (keyframes, Vec::new())
            }
            (TranscriptionOutcome::Failed(reason), _) => {
                warn!(file_name, "Transcription failed; continuing without subtitles: {}", reason);
                (keyframes, Vec::new())
            }
            (TranscriptionOutcome::Completed { .. }, None) => (keyframes, Vec::new()),
        };

        TranscriptionReport {
            job_id,
            outcome,
            keyframes,
            transcript,
        }
    }
}

/// Join segment texts with single spaces, skipping blanks.
pub fn join_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
