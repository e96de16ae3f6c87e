//! Transcription backend HTTP client.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use vlens_models::TranscriptSegment;

use crate::config::TranscriptionConfig;
use crate::error::{TranscribeError, TranscribeResult};
use crate::events::{event_stream, EventSubscription};

/// Operations the coordinator needs from a transcription backend.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Upload the source media, returning the backend job ID.
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> TranscribeResult<String>;

    /// Open the event stream for a job.
    async fn subscribe(&self, job_id: &str) -> TranscribeResult<EventSubscription>;

    /// Segments overlapping `timestamp ± window_secs`.
    async fn subtitles_at(
        &self,
        job_id: &str,
        timestamp: f64,
        window_secs: f64,
    ) -> TranscribeResult<Vec<TranscriptSegment>>;

    /// Every segment of a job.
    async fn all_segments(&self, job_id: &str) -> TranscribeResult<Vec<TranscriptSegment>>;

    /// Whether the backend answers its health probe.
    async fn health_check(&self) -> bool;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "videoId", alias = "id", alias = "jobId")]
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct SegmentsResponse {
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// HTTP client for the recognition server.
pub struct HttpTranscriptionClient {
    http: Client,
    /// Event streams outlive the per-request timeout, so they get a client
    /// without one; the coordinator bounds the wait instead.
    streaming: Client,
    config: TranscriptionConfig,
}

impl HttpTranscriptionClient {
    pub fn new(config: TranscriptionConfig) -> TranscribeResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let streaming = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            streaming,
            config,
        })
    }

    pub fn from_env() -> TranscribeResult<Self> {
        Self::new(TranscriptionConfig::from_env())
    }

    pub fn config(&self) -> &TranscriptionConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn check_status(response: reqwest::Response) -> TranscribeResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(TranscribeError::from_status(status, body))
    }

    async fn fetch_segments(
        &self,
        job_id: &str,
        query: &[(&str, String)],
    ) -> TranscribeResult<Vec<TranscriptSegment>> {
        let url = self.url(&format!("/api/videos/{}/subtitles", job_id));
        let response = self.http.get(&url).query(query).send().await?;
        let parsed: SegmentsResponse = Self::check_status(response).await?.json().await?;
        Ok(parsed.segments)
    }
}

#[async_trait]
impl TranscriptionBackend for HttpTranscriptionClient {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> TranscribeResult<String> {
        let url = self.url("/api/videos/upload");
        debug!(file_name, bytes = bytes.len(), "Uploading media for transcription");

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("video", part);

        let response = self.http.post(&url).multipart(form).send().await?;
        let upload: UploadResponse = Self::check_status(response).await?.json().await?;

        if upload.video_id.is_empty() {
            return Err(TranscribeError::InvalidResponse(
                "upload response carried an empty id".to_string(),
            ));
        }
        Ok(upload.video_id)
    }

    async fn subscribe(&self, job_id: &str) -> TranscribeResult<EventSubscription> {
        let url = self.url(&format!("/api/videos/{}/events", job_id));
        let response = self
            .streaming
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(event_stream(response.bytes_stream()))
    }

    async fn subtitles_at(
        &self,
        job_id: &str,
        timestamp: f64,
        window_secs: f64,
    ) -> TranscribeResult<Vec<TranscriptSegment>> {
        self.fetch_segments(
            job_id,
            &[
                ("timestamp", timestamp.to_string()),
                ("context", window_secs.to_string()),
            ],
        )
        .await
    }

    async fn all_segments(&self, job_id: &str) -> TranscribeResult<Vec<TranscriptSegment>> {
        self.fetch_segments(job_id, &[]).await
    }

    async fn health_check(&self) -> bool {
        let url = self.url("/api/health");

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(health) => health.status == "ok" || health.status == "healthy",
                    Err(e) => {
                        warn!("Transcription health response unreadable: {}", e);
                        false
                    }
                }
            }
            Ok(response) => {
                warn!("Transcription health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Transcription health check error: {}", e);
                false
            }
        }
    }
}
