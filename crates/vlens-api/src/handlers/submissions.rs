//! Submission handlers: upload, status, cancel and status events.

use std::convert::Infallible;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;
use vlens_models::{SubmissionId, SubmissionStatus, VideoSubmission};
use vlens_queue::CancelOutcome;

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_admission;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitQuery {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub submission_id: SubmissionId,
    pub duplicate: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub submission_id: SubmissionId,
    pub outcome: &'static str,
}

/// Keep only characters that are safe in a file name.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Stream a request body to a fresh file under `dir`. Returns the path and
/// the number of bytes written.
async fn spool_upload(dir: &Path, name: &str, body: Body) -> ApiResult<(PathBuf, u64)> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}_{}", Uuid::new_v4(), sanitize_file_name(name)));
    let mut file = tokio::fs::File::create(&path).await?;

    let mut stream = body.into_data_stream();
    let mut size: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(ApiError::bad_request(format!("upload interrupted: {}", e)));
            }
        };
        if let Err(e) = file.write_all(&chunk).await {
            drop(file);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }
        size += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    if size == 0 {
        let _ = tokio::fs::remove_file(&path).await;
        return Err(ApiError::bad_request("empty upload"));
    }
    Ok((path, size))
}

/// Accept a raw video body and enqueue it.
///
/// Responds 202 with the submission ID. Re-submitting a file with the same
/// name and size while it is still in flight returns the existing ID.
pub async fn submit_video(
    State(state): State<AppState>,
    Query(query): Query<SubmitQuery>,
    body: Body,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let name = query
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("query parameter 'name' is required"))?;

    let (path, size) = spool_upload(&state.config.upload_dir, &name, body).await?;
    let submission = VideoSubmission::new(&name, size, &path);

    let admission = match state.queue.enqueue(submission).await {
        Ok(admission) => admission,
        Err(e) => {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }
    };

    if admission.duplicate {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), "Failed to remove duplicate upload: {}", e);
        }
    }
    record_admission(admission.duplicate, size);
    info!(
        submission_id = %admission.id,
        name = %name,
        size_bytes = size,
        duplicate = admission.duplicate,
        "Upload accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            submission_id: admission.id,
            duplicate: admission.duplicate,
        }),
    ))
}

/// All tracked submissions, oldest first.
pub async fn list_submissions(State(state): State<AppState>) -> Json<Vec<SubmissionStatus>> {
    Json(state.queue.list().await)
}

pub async fn get_submission(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> ApiResult<Json<SubmissionStatus>> {
    state
        .queue
        .status(&SubmissionId::from(id.as_str()))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Submission {} not found", id)))
}

pub async fn cancel_submission(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> ApiResult<Json<CancelResponse>> {
    let id = SubmissionId::from(id.as_str());
    let outcome = match state.queue.cancel(&id).await? {
        CancelOutcome::Removed => "removed",
        CancelOutcome::Signalled => "signalled",
    };
    Ok(Json(CancelResponse {
        submission_id: id,
        outcome,
    }))
}

/// Server-sent stream of submission status changes.
pub async fn submission_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.queue.progress().subscribe();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(status) => {
                    let event = Event::default()
                        .event("status")
                        .json_data(&status)
                        .unwrap_or_else(|_| Event::default().comment("unserializable status"));
                    return Some((Ok(event), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Status subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my video (1).mov"), "my_video__1_.mov");
        assert_eq!(sanitize_file_name("..."), "upload");
        assert_eq!(sanitize_file_name("C:\\videos\\a.mp4"), "a.mp4");
    }
}
