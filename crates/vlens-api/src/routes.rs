//! API routes.

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use crate::handlers::submissions::{
    cancel_submission, get_submission, list_submissions, submission_events, submit_video,
};
use crate::handlers::videos::{delete_video, get_subtitles, get_video, list_videos, search_videos};
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id_header, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // Uploads and the event stream are long-lived; only store reads get a timeout.
    let upload_routes = Router::new()
        .route("/submissions", post(submit_video).get(list_submissions))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size));

    let submission_routes = Router::new()
        .route("/submissions/events", get(submission_events))
        .route("/submissions/:submission_id", get(get_submission))
        .route("/submissions/:submission_id/cancel", post(cancel_submission));

    let video_routes = Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/search", get(search_videos))
        .route("/videos/:video_id", get(get_video).delete(delete_video))
        .route("/videos/:video_id/:file", get(get_subtitles))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout,
        ));

    let api_routes = Router::new()
        .merge(upload_routes)
        .merge(submission_routes)
        .merge(video_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(PropagateRequestIdLayer::new(request_id_header()))
        .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
