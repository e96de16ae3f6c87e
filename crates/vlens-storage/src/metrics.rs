//! Storage metrics.

use metrics::{counter, gauge, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Primary store requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "vlens_store_requests_total";

    /// Retry attempts against the primary store by operation.
    pub const RETRIES_TOTAL: &str = "vlens_store_retries_total";

    /// Operations served by the local store instead of the primary.
    pub const FALLBACKS_TOTAL: &str = "vlens_store_fallbacks_total";

    /// Primary store request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "vlens_store_latency_seconds";

    /// 1 when the primary store was last seen healthy.
    pub const PRIMARY_HEALTHY: &str = "vlens_store_primary_healthy";
}

/// Record a completed primary store request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

/// Record an operation that fell back to the local store.
pub fn record_fallback(operation: &str) {
    counter!(names::FALLBACKS_TOTAL, "operation" => operation.to_string()).increment(1);
}

/// Record the latest health probe result.
pub fn record_primary_health(healthy: bool) {
    gauge!(names::PRIMARY_HEALTHY).set(if healthy { 1.0 } else { 0.0 });
}
