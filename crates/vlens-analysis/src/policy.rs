//! Payload sizing policy.

/// Limits applied while building an analysis request.
#[derive(Debug, Clone)]
pub struct RequestPolicy {
    /// Maximum serialized request size in bytes
    pub budget_bytes: usize,
    /// Fraction of frames kept on each shrink
    pub shrink_ratio: f64,
    /// Maximum number of shrink iterations
    pub max_shrink_attempts: u32,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            budget_bytes: 28 * 1024 * 1024,
            shrink_ratio: 0.8,
            max_shrink_attempts: 5,
        }
    }
}

impl RequestPolicy {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            budget_bytes: std::env::var("ANALYSIS_PAYLOAD_BUDGET_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|b: &usize| *b > 0)
                .unwrap_or(defaults.budget_bytes),
            shrink_ratio: std::env::var("ANALYSIS_SHRINK_RATIO")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|r: &f64| *r > 0.0 && *r < 1.0)
                .unwrap_or(defaults.shrink_ratio),
            max_shrink_attempts: std::env::var("ANALYSIS_MAX_SHRINK_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_shrink_attempts),
        }
    }

    /// Frame count for the next attempt.
    ///
    /// Always strictly below `current` and at least 1; `None` when `current`
    /// is already 1 or less.
    pub fn shrink_count(&self, current: usize) -> Option<usize> {
        if current <= 1 {
            return None;
        }
        let scaled = (current as f64 * self.shrink_ratio).floor() as usize;
        Some(scaled.min(current - 1).max(1))
    }
}
