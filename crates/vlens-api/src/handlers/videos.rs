//! Stored video handlers.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::info;
use vlens_models::{VideoId, VideoRecord};
use vlens_transcribe::SubtitleFormat;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub async fn list_videos(State(state): State<AppState>) -> ApiResult<Json<Vec<VideoRecord>>> {
    Ok(Json(state.gateway.get_all().await?))
}

/// Search by name and summary. A blank query lists everything.
pub async fn search_videos(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<VideoRecord>>> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    let records = if q.is_empty() {
        state.gateway.get_all().await?
    } else {
        state.gateway.search(q).await?
    };
    Ok(Json(records))
}

async fn find_video(state: &AppState, video_id: &str) -> ApiResult<VideoRecord> {
    state
        .gateway
        .get_by_id(&VideoId::from(video_id))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Video {} not found", video_id)))
}

pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoRecord>> {
    Ok(Json(find_video(&state, &video_id).await?))
}

/// Delete from every store holding the video.
pub async fn delete_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<StatusCode> {
    let report = state.gateway.delete(&VideoId::from(video_id.as_str())).await;
    if !report.any() {
        return Err(ApiError::not_found(format!("Video {} not found", video_id)));
    }
    info!(
        video_id = %video_id,
        primary = report.primary,
        local = report.local,
        "Deleted video"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// `subtitles.srt` or `subtitles.vtt` rendered from the stored transcript.
pub async fn get_subtitles(
    State(state): State<AppState>,
    Path((video_id, file)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let format = file
        .strip_prefix("subtitles.")
        .and_then(SubtitleFormat::from_extension)
        .ok_or_else(|| ApiError::not_found(format!("Unknown resource {}", file)))?;

    let record = find_video(&state, &video_id).await?;
    if record.video.transcript.is_empty() {
        return Err(ApiError::not_found(format!(
            "Video {} has no transcript",
            video_id
        )));
    }

    Ok((
        [(header::CONTENT_TYPE, format.content_type())],
        format.render(&record.video.transcript),
    ))
}
