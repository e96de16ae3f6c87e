//! Submission worker for vlens.
//!
//! This crate provides:
//! - The per-submission pipeline (extract, dedup, transcribe, analyze, save)
//! - A worker pool that drains the ingestion queue
//! - Cancellation, job timeouts and graceful shutdown
//! - Structured submission logging and metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;


pub use config::{PipelineConfig, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use executor::SubmissionExecutor;
pub use logging::SubmissionLogger;
pub use processor::{
    prior_context, DecoderFactory, FfmpegDecoderFactory, Pipeline, SubmissionProcessor,
};
