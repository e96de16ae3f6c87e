//! Per-submission pipeline.
//!
//! extract → dedup → transcribe → analyze → save, advancing the queue's
//! state machine at each stage boundary.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::Instrument;
use vlens_analysis::{plan_request, AnalysisService};
use vlens_media::{deduplicate, FfmpegDecoder, FrameDecoder, FrameSampler, MediaResult};
use vlens_models::{AnalyzedVideo, Keyframe, SubmissionState, TranscriptSegment, VideoId, VideoSubmission};
use vlens_queue::IngestionQueue;
use vlens_storage::{OriginalFile, PersistenceGateway};
use vlens_transcribe::{join_segments, TranscriptionBackend, TranscriptionCoordinator};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::SubmissionLogger;
use crate::metrics::record_keyframes;

/// Runs one claimed submission to a stored video.
#[async_trait]
pub trait SubmissionProcessor: Send + Sync {
    async fn process(&self, submission: &VideoSubmission, queue: &IngestionQueue) -> WorkerResult<VideoId>;
}

/// Opens a fresh decoder for each submission.
pub trait DecoderFactory: Send + Sync {
    fn open(&self, source: &Path) -> MediaResult<Box<dyn FrameDecoder>>;
}

/// Production decoders backed by FFmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegDecoderFactory {
    seek_timeout: Duration,
}

impl FfmpegDecoderFactory {
    pub fn new(seek_timeout: Duration) -> Self {
        Self { seek_timeout }
    }
}

impl DecoderFactory for FfmpegDecoderFactory {
    fn open(&self, source: &Path) -> MediaResult<Box<dyn FrameDecoder>> {
        Ok(Box::new(FfmpegDecoder::open(source, self.seek_timeout)?))
    }
}

/// Transcript text sent as prior context, capped at `max_chars`.
pub fn prior_context(transcript: &[TranscriptSegment], max_chars: usize) -> Option<String> {
    let text = join_segments(transcript);
    if text.is_empty() || max_chars == 0 {
        return None;
    }
    Some(text.chars().take(max_chars).collect())
}

/// The production pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    decoders: Arc<dyn DecoderFactory>,
    sampler: FrameSampler,
    transcription: Option<TranscriptionCoordinator>,
    analysis: Arc<dyn AnalysisService>,
    gateway: Arc<PersistenceGateway>,
}

impl Pipeline {
    /// `transcription` is ignored when transcription is disabled in config.
    pub fn new(
        config: PipelineConfig,
        decoders: Arc<dyn DecoderFactory>,
        transcription: Option<Arc<dyn TranscriptionBackend>>,
        analysis: Arc<dyn AnalysisService>,
        gateway: Arc<PersistenceGateway>,
    ) -> Self {
        let transcription = transcription
            .filter(|_| config.transcription.enabled)
            .map(|backend| TranscriptionCoordinator::new(backend, config.transcription.clone()));

        Self {
            sampler: FrameSampler::new(config.sampler.clone()),
            config,
            decoders,
            transcription,
            analysis,
            gateway,
        }
    }

    pub fn gateway(&self) -> &Arc<PersistenceGateway> {
        &self.gateway
    }

    async fn extract(&self, submission: &VideoSubmission, logger: &SubmissionLogger) -> WorkerResult<Vec<Keyframe>> {
        let mut decoder = self.decoders.open(&submission.source_path)?;
        let candidates = self.sampler.sample(decoder.as_mut()).await?;
        drop(decoder);

        let candidate_count = candidates.len();
        let keyframes = deduplicate(candidates, self.config.dedup_threshold);
        record_keyframes(candidate_count, keyframes.len());
        logger.log_progress(&format!(
            "kept {} of {} sampled frames",
            keyframes.len(),
            candidate_count
        ));

        if keyframes.is_empty() {
            return Err(WorkerError::processing_failed("no frames could be extracted"));
        }
        Ok(keyframes)
    }

    async fn transcribe(
        &self,
        submission: &VideoSubmission,
        keyframes: Vec<Keyframe>,
        logger: &SubmissionLogger,
    ) -> (Vec<Keyframe>, Vec<TranscriptSegment>) {
        let Some(coordinator) = &self.transcription else {
            logger.log_progress("transcription disabled, analyzing keyframes only");
            return (keyframes, Vec::new());
        };

        let report = coordinator
            .run(&submission.name, &submission.source_path, keyframes)
            .await;
        if !report.outcome.is_success() {
            logger.log_warning(&format!(
                "transcription {}, analyzing keyframes only",
                report.outcome.as_str()
            ));
        }
        (report.keyframes, report.transcript)
    }
}

#[async_trait]
impl SubmissionProcessor for Pipeline {
    async fn process(&self, submission: &VideoSubmission, queue: &IngestionQueue) -> WorkerResult<VideoId> {
        let logger = SubmissionLogger::new(submission);
        let span = logger.create_span();

        async {
            logger.log_stage(SubmissionState::Extracting);
            let keyframes = self.extract(submission, &logger).await?;

            queue
                .advance(&submission.id, SubmissionState::AwaitingTranscription)
                .await?;
            logger.log_stage(SubmissionState::AwaitingTranscription);
            let (keyframes, transcript) = self.transcribe(submission, keyframes, &logger).await;

            queue.advance(&submission.id, SubmissionState::Analyzing).await?;
            logger.log_stage(SubmissionState::Analyzing);
            let analysis_config = &self.config.analysis;
            let context = prior_context(&transcript, analysis_config.max_prior_context_chars);
            let prepared = plan_request(
                &keyframes,
                &analysis_config.instructions,
                context.as_deref(),
                &analysis_config.policy,
            )?;
            if prepared.shrink_attempts > 0 {
                logger.log_progress(&format!(
                    "request shrunk to {} frames after {} attempts",
                    prepared.frame_count(),
                    prepared.shrink_attempts
                ));
            }
            let analysis = self.analysis.analyze(&prepared).await?;

            // Store exactly the frames the analysis refers to.
            let sent: Vec<Keyframe> = keyframes
                .into_iter()
                .filter(|k| prepared.timestamps.contains(&k.timestamp))
                .collect();

            queue.advance(&submission.id, SubmissionState::Saving).await?;
            logger.log_stage(SubmissionState::Saving);
            let video = AnalyzedVideo::new(&submission.name, analysis, &sent, transcript);
            let original = OriginalFile::new(&submission.name, &submission.source_path);
            let receipt = self.gateway.save(&video, Some(&original)).await?;

            logger.log_progress(&format!(
                "saved video {} to {} store",
                receipt.record.id,
                receipt.location.as_str()
            ));
            Ok::<VideoId, WorkerError>(receipt.record.id)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prior_context_truncates_on_char_boundary() {
        let transcript = vec![
            TranscriptSegment::new(0.0, 1.0, "héllo"),
            TranscriptSegment::new(1.0, 2.0, "wörld"),
        ];
        assert_eq!(prior_context(&transcript, 100).as_deref(), Some("héllo wörld"));
        assert_eq!(prior_context(&transcript, 2).as_deref(), Some("hé"));
        assert!(prior_context(&transcript, 0).is_none());
        assert!(prior_context(&[], 100).is_none());
    }
}
