//! Worker metrics.

use metrics::{counter, gauge, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Finished submissions by outcome.
    pub const SUBMISSIONS_TOTAL: &str = "vlens_submissions_total";

    /// Wall time from claim to terminal state.
    pub const SUBMISSION_DURATION_SECONDS: &str = "vlens_submission_duration_seconds";

    /// Sampled frames per submission.
    pub const CANDIDATE_FRAMES: &str = "vlens_candidate_frames";

    /// Frames surviving deduplication per submission.
    pub const KEYFRAMES_KEPT: &str = "vlens_keyframes_kept";

    /// Submissions currently held by a worker.
    pub const ACTIVE_WORKERS: &str = "vlens_workers_active";
}

pub fn record_submission(outcome: &'static str, duration_secs: f64) {
    counter!(names::SUBMISSIONS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::SUBMISSION_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

pub fn record_keyframes(candidates: usize, kept: usize) {
    histogram!(names::CANDIDATE_FRAMES).record(candidates as f64);
    histogram!(names::KEYFRAMES_KEPT).record(kept as f64);
}

pub fn set_active_workers(active: usize) {
    gauge!(names::ACTIVE_WORKERS).set(active as f64);
}
