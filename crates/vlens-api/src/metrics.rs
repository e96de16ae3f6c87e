//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vlens_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vlens_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vlens_http_requests_in_flight";
    pub const UPLOAD_BYTES_TOTAL: &str = "vlens_upload_bytes_total";
    pub const SUBMISSIONS_ADMITTED_TOTAL: &str = "vlens_submissions_admitted_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an accepted upload.
pub fn record_admission(duplicate: bool, bytes: u64) {
    let labels = [("duplicate", duplicate.to_string())];
    counter!(names::SUBMISSIONS_ADMITTED_TOTAL, &labels).increment(1);
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
}

/// Metrics middleware for HTTP requests.
///
/// Must be installed with `route_layer` so the matched route template is
/// available; IDs never end up in labels.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
