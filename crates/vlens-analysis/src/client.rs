//! Content-understanding service client.

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vlens_models::AnalysisData;

use crate::builder::PreparedRequest;
use crate::error::{AnalysisError, AnalysisResult};
use crate::parse::{attach_timestamps, parse_response};
use crate::policy::RequestPolicy;

/// Default instructions sent with every request.
pub const DEFAULT_INSTRUCTIONS: &str = "You are given keyframes sampled from one video, in \
chronological order, each optionally paired with the speech heard around it. Describe what \
happens in the video. Return ONLY a JSON object of the form \
{\"summary\": string, \"perFrameAnalysis\": [{\"frameIndex\": number, \"description\": string}]} \
with exactly one perFrameAnalysis entry per image.";

/// Upper bound on `ANALYSIS_RETRIES`.
const MAX_RETRIES: u32 = 10;

const RETRY_BASE_DELAY_MS: u64 = 500;
const RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Exponential backoff, capped.
fn retry_delay(attempt: u32) -> Duration {
    let ms = RETRY_BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(ms.min(RETRY_MAX_DELAY_MS))
}

/// Configuration for the analysis client.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Full URL of the analysis endpoint
    pub endpoint: String,
    /// Bearer token, if the service requires one
    pub api_key: Option<String>,
    /// Ceiling on the total request wait
    pub timeout: Duration,
    /// Max retries on transport failures
    pub max_retries: u32,
    pub instructions: String,
    /// Cap on transcript text sent as prior context
    pub max_prior_context_chars: usize,
    pub policy: RequestPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8001/analyze".to_string(),
            api_key: None,
            timeout: Duration::from_secs(300),
            max_retries: 2,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            max_prior_context_chars: 8_000,
            policy: RequestPolicy::default(),
        }
    }
}

impl AnalysisConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("ANALYSIS_SERVICE_URL").unwrap_or(defaults.endpoint),
            api_key: std::env::var("ANALYSIS_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout: std::env::var("ANALYSIS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("ANALYSIS_RETRIES")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .map(|n| n.min(MAX_RETRIES))
                .unwrap_or(defaults.max_retries),
            instructions: std::env::var("ANALYSIS_INSTRUCTIONS")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.instructions),
            max_prior_context_chars: std::env::var("ANALYSIS_MAX_PRIOR_CONTEXT_CHARS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_prior_context_chars),
            policy: RequestPolicy::from_env(),
        }
    }
}

/// A service able to analyze a prepared request.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, request: &PreparedRequest) -> AnalysisResult<AnalysisData>;
}

/// HTTP client for the analysis service.
pub struct HttpAnalysisClient {
    http: Client,
    config: AnalysisConfig,
}

impl HttpAnalysisClient {
    pub fn new(config: AnalysisConfig) -> AnalysisResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> AnalysisResult<Self> {
        Self::new(AnalysisConfig::from_env())
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    async fn send(&self, body: &str) -> AnalysisResult<String> {
        let mut request = self
            .http
            .post(&self.config.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(AnalysisError::Service {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> AnalysisResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = AnalysisResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = retry_delay(attempt);
                    warn!(
                        "Analysis request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn analyze(&self, request: &PreparedRequest) -> AnalysisResult<AnalysisData> {
        let start = Instant::now();
        debug!(
            endpoint = %self.config.endpoint,
            frames = request.frame_count(),
            size_bytes = request.size_bytes,
            "Sending analysis request"
        );

        let text = self.with_retry(|| self.send(&request.body)).await?;
        let mut data = parse_response(&text)?;
        attach_timestamps(&mut data, &request.timestamps);

        metrics::histogram!("vlens_analysis_request_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        info!(
            frames = request.frame_count(),
            analyses = data.frame_analyses.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis completed"
        );
        Ok(data)
    }
}
