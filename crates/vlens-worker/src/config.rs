//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vlens_analysis::AnalysisConfig;
use vlens_media::{SamplerConfig, DEFAULT_THRESHOLD};
use vlens_transcribe::TranscriptionConfig;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum submissions processed at once
    pub max_concurrent_workers: usize,
    /// Ceiling on one submission's whole pipeline
    pub job_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Work directory for uploaded sources
    pub work_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workers: 1,
            job_timeout: Duration::from_secs(3600), // 1 hour
            shutdown_timeout: Duration::from_secs(30),
            work_dir: PathBuf::from("/tmp/vlens"),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_workers: std::env::var("WORKER_MAX_CONCURRENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(1),
            job_timeout: Duration::from_secs(
                std::env::var("WORKER_JOB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/vlens")),
        }
    }
}

/// Settings for each pipeline stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sampler: SamplerConfig,
    /// Max Hamming distance at which adjacent frames count as duplicates
    pub dedup_threshold: u32,
    pub transcription: TranscriptionConfig,
    pub analysis: AnalysisConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            dedup_threshold: DEFAULT_THRESHOLD,
            transcription: TranscriptionConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            sampler: SamplerConfig::from_env(),
            dedup_threshold: std::env::var("VLENS_DEDUP_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_THRESHOLD),
            transcription: TranscriptionConfig::from_env(),
            analysis: AnalysisConfig::from_env(),
        }
    }
}
