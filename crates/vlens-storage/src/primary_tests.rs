//! HTTP tests for the primary store client.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vlens_models::{AnalysisData, AnalyzedVideo, FrameAnalysis, VideoId};

use crate::error::StorageError;
use crate::primary::{HttpVideoStore, PrimaryStoreConfig};
use crate::retry::RetryConfig;
use crate::store::{OriginalFile, VideoStore};

fn store_for(server: &MockServer, retry: RetryConfig) -> HttpVideoStore {
    HttpVideoStore::new(PrimaryStoreConfig {
        base_url: format!("{}/api", server.uri()),
        timeout: Duration::from_secs(5),
        health_timeout: Duration::from_secs(1),
        retry,
    })
    .unwrap()
}

fn video() -> AnalyzedVideo {
    AnalyzedVideo::new(
        "beach.mp4",
        AnalysisData {
            summary: "waves".to_string(),
            frame_analyses: vec![FrameAnalysis {
                frame_index: 0,
                timestamp: Some(0.0),
                description: "sand".to_string(),
            }],
        },
        &[],
        Vec::new(),
    )
}

fn record_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": "beach.mp4",
        "analysisData": {"summary": "waves", "frameAnalyses": []},
        "frameRefs": [],
        "createdAt": "2024-05-01T12:00:00Z"
    })
}

#[tokio::test]
async fn test_save_uploads_original_then_creates_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"filePath": "uploads/beach.mp4"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/videos"))
        .and(body_partial_json(json!({
            "name": "beach.mp4",
            "filePath": "uploads/beach.mp4",
            "analysisData": {"summary": "waves"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "p-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("upload.bin");
    tokio::fs::write(&source, b"bytes").await.unwrap();

    let store = store_for(&server, RetryConfig::none());
    let record = store
        .save(&video(), Some(&OriginalFile::new("beach.mp4", &source)), None)
        .await
        .unwrap();

    assert_eq!(record.id, VideoId::from("p-1"));
    assert_eq!(record.file_path.as_deref(), Some("uploads/beach.mp4"));
}

#[tokio::test]
async fn test_list_accepts_bare_and_wrapped_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([record_json("a")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/videos/search"))
        .and(query_param("q", "sea side"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"videos": [record_json("b")]})),
        )
        .mount(&server)
        .await;

    let store = store_for(&server, RetryConfig::none());
    let all = store.list().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id.as_str(), "a");

    let hits = store.search("sea side").await.unwrap();
    assert_eq!(hits[0].id.as_str(), "b");
}

#[tokio::test]
async fn test_get_missing_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store_for(&server, RetryConfig::default());
    assert!(store.get(&VideoId::from("nope")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/videos/v1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let store = store_for(
        &server,
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
    );
    let err = store.delete(&VideoId::from("v1")).await.unwrap_err();
    assert!(matches!(err, StorageError::PrimaryUnavailable(_)));
}

#[tokio::test]
async fn test_health_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = store_for(&server, RetryConfig::none());
    assert!(store.health().await.is_ok());

    let unreachable = HttpVideoStore::new(PrimaryStoreConfig {
        base_url: "http://127.0.0.1:1/api".to_string(),
        health_timeout: Duration::from_millis(500),
        ..PrimaryStoreConfig::default()
    })
    .unwrap();
    assert!(matches!(
        unreachable.health().await,
        Err(StorageError::PrimaryUnavailable(_))
    ));
}
