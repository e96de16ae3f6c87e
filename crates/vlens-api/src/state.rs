//! Application state.

use std::sync::Arc;

use tracing::{info, warn};
use vlens_analysis::HttpAnalysisClient;
use vlens_media::check_ffmpeg;
use vlens_queue::IngestionQueue;
use vlens_storage::{GatewayConfig, HttpVideoStore, LocalVideoStore, PersistenceGateway};
use vlens_transcribe::{HttpTranscriptionClient, TranscriptionBackend};
use vlens_worker::{FfmpegDecoderFactory, Pipeline, PipelineConfig, SubmissionExecutor, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub queue: Arc<IngestionQueue>,
    pub gateway: Arc<PersistenceGateway>,
}

impl AppState {
    pub fn new(config: ApiConfig, queue: Arc<IngestionQueue>, gateway: Arc<PersistenceGateway>) -> Self {
        Self {
            config,
            queue,
            gateway,
        }
    }
}

/// Everything the server binary wires together at startup.
pub struct Services {
    pub state: AppState,
    pub executor: Arc<SubmissionExecutor>,
}

impl Services {
    /// Build stores, clients, the pipeline and the worker pool from the environment.
    pub fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        if let Err(e) = check_ffmpeg() {
            warn!("{}; frame extraction will fail until it is installed", e);
        }

        let primary = HttpVideoStore::from_env()?;
        let local = LocalVideoStore::from_env();
        info!(local_dir = %local.data_dir().display(), "Local video store ready");
        let gateway = Arc::new(PersistenceGateway::new(
            Arc::new(primary),
            Arc::new(local),
            GatewayConfig::from_env(),
        ));

        let pipeline_config = PipelineConfig::from_env();
        let transcription: Option<Arc<dyn TranscriptionBackend>> = if pipeline_config.transcription.enabled {
            Some(Arc::new(HttpTranscriptionClient::new(
                pipeline_config.transcription.clone(),
            )?))
        } else {
            info!("Transcription disabled");
            None
        };
        let analysis = Arc::new(HttpAnalysisClient::new(pipeline_config.analysis.clone())?);
        let decoders = Arc::new(FfmpegDecoderFactory::new(pipeline_config.sampler.seek_timeout));
        let pipeline = Pipeline::new(
            pipeline_config,
            decoders,
            transcription,
            analysis,
            Arc::clone(&gateway),
        );

        let queue = Arc::new(IngestionQueue::from_env());
        let executor = Arc::new(SubmissionExecutor::new(
            WorkerConfig::from_env(),
            Arc::clone(&queue),
            Arc::new(pipeline),
        ));

        Ok(Self {
            state: AppState::new(config, queue, gateway),
            executor,
        })
    }
}
