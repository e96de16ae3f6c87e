//! Primary store REST client.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use vlens_models::{AnalyzedVideo, VideoId, VideoRecord};

use crate::error::{StorageError, StorageResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::store::{OriginalFile, VideoStore};

/// Configuration for the primary store.
#[derive(Debug, Clone)]
pub struct PrimaryStoreConfig {
    /// Base URL of the store API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Timeout for the health probe
    pub health_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for PrimaryStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3004/api".to_string(),
            timeout: Duration::from_secs(60),
            health_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }
}

impl PrimaryStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("PRIMARY_STORE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("PRIMARY_STORE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            health_timeout: std::env::var("PRIMARY_STORE_HEALTH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.health_timeout),
            retry: RetryConfig::from_env(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileUploadResponse {
    file_path: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: VideoId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    file_path: Option<&'a str>,
    #[serde(flatten)]
    video: &'a AnalyzedVideo,
}

/// Lists come back either bare or wrapped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<VideoRecord>),
    Wrapped { videos: Vec<VideoRecord> },
}

impl ListResponse {
    fn into_records(self) -> Vec<VideoRecord> {
        match self {
            ListResponse::Bare(records) | ListResponse::Wrapped { videos: records } => records,
        }
    }
}

/// REST-backed primary store.
pub struct HttpVideoStore {
    http: Client,
    config: PrimaryStoreConfig,
}

impl HttpVideoStore {
    pub fn new(config: PrimaryStoreConfig) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StorageError::config_error(format!("HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> StorageResult<Self> {
        Self::new(PrimaryStoreConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Send a request and map non-success statuses to errors.
    async fn execute(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> StorageResult<Response> {
        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status().as_u16();
        record_request(operation, status, start.elapsed().as_secs_f64() * 1000.0);

        if response.status().is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::from_http_status(status, body))
    }

    async fn upload_original(&self, original: &OriginalFile) -> StorageResult<String> {
        let bytes = tokio::fs::read(&original.path).await?;
        debug!(name = %original.name, bytes = bytes.len(), "Uploading original to primary store");

        // Multipart forms are single-use, so a retry rebuilds the part.
        let response = with_retry(&self.config.retry, "upload_file", || async {
            let part = Part::bytes(bytes.clone())
                .file_name(original.name.clone())
                .mime_str("application/octet-stream")?;
            let form = Form::new().part("file", part);
            self.execute("upload_file", self.http.post(self.url("/videos/files")).multipart(form))
                .await
        })
        .await?;

        let uploaded: FileUploadResponse = response.json().await?;
        Ok(uploaded.file_path)
    }

    async fn fetch_list(&self, operation: &str, path: String) -> StorageResult<Vec<VideoRecord>> {
        let response = with_retry(&self.config.retry, operation, || {
            self.execute(operation, self.http.get(&path))
        })
        .await?;
        let list: ListResponse = response.json().await?;
        Ok(list.into_records())
    }
}

#[async_trait]
impl VideoStore for HttpVideoStore {
    fn name(&self) -> &'static str {
        "primary"
    }

    async fn health(&self) -> StorageResult<()> {
        let response = self
            .http
            .get(self.url("/health"))
            .timeout(self.config.health_timeout)
            .send()
            .await
            .map_err(|e| StorageError::primary_unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StorageError::primary_unavailable(format!(
                "health probe returned {}",
                response.status()
            )))
        }
    }

    async fn save(
        &self,
        video: &AnalyzedVideo,
        original: Option<&OriginalFile>,
        _id: Option<&VideoId>,
    ) -> StorageResult<VideoRecord> {
        let file_path = match original {
            Some(original) => Some(self.upload_original(original).await?),
            None => None,
        };

        let body = CreateRequest {
            file_path: file_path.as_deref(),
            video,
        };
        let response = with_retry(&self.config.retry, "create", || {
            self.execute("create", self.http.post(self.url("/videos")).json(&body))
        })
        .await?;
        let created: CreateResponse = response.json().await?;

        info!(video_id = %created.id, name = %video.name, "Saved video to primary store");
        Ok(VideoRecord::new(created.id, file_path, video.clone()))
    }

    async fn list(&self) -> StorageResult<Vec<VideoRecord>> {
        self.fetch_list("list", self.url("/videos")).await
    }

    async fn get(&self, id: &VideoId) -> StorageResult<Option<VideoRecord>> {
        let path = self.url(&format!("/videos/{}", urlencoding::encode(id.as_str())));
        let result = with_retry(&self.config.retry, "get", || {
            self.execute("get", self.http.get(&path))
        })
        .await;

        match result {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn search(&self, query: &str) -> StorageResult<Vec<VideoRecord>> {
        let path = self.url(&format!("/videos/search?q={}", urlencoding::encode(query)));
        self.fetch_list("search", path).await
    }

    async fn delete(&self, id: &VideoId) -> StorageResult<bool> {
        let path = self.url(&format!("/videos/{}", urlencoding::encode(id.as_str())));
        let result = with_retry(&self.config.retry, "delete", || {
            self.execute("delete", self.http.delete(&path))
        })
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
