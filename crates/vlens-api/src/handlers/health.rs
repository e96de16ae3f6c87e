//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use vlens_storage::StoreLocation;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub primary_store: PrimaryStoreCheck,
    pub queue: QueueCheck,
}

/// Primary store availability as last seen by the persistence gateway.
#[derive(Serialize)]
pub struct PrimaryStoreCheck {
    pub reachable: bool,
    /// Seconds since the last probe or failed write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_secs_ago: Option<u64>,
    /// Where new videos are currently saved
    pub saving_to: &'static str,
}

#[derive(Serialize)]
pub struct QueueCheck {
    pub pending: usize,
    pub active: usize,
}

/// Readiness check endpoint (readiness probe).
///
/// Ready only while the primary store is reachable. The gateway caches the
/// probe, so polling this does not hammer the store. Uploads are accepted
/// either way; results land in the local store while the primary is down.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let reachable = state.gateway.primary_healthy().await;
    let checked = state.gateway.health().await.last_checked;

    let response = ReadinessResponse {
        status: if reachable { "ready" } else { "not_ready" },
        primary_store: PrimaryStoreCheck {
            reachable,
            checked_secs_ago: checked.map(|at| at.elapsed().as_secs()),
            saving_to: if reachable {
                StoreLocation::Primary.as_str()
            } else {
                StoreLocation::Local.as_str()
            },
        },
        queue: QueueCheck {
            pending: state.queue.pending_len().await,
            active: state.queue.active_len().await,
        },
    };

    if reachable {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
