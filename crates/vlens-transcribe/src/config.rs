//! Transcription configuration.

use std::time::Duration;

/// Configuration for the transcription backend and coordinator.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Set to false to analyze keyframes without transcripts
    pub enabled: bool,
    /// Base URL of the recognition server
    pub base_url: String,
    /// Ceiling on the wait for a terminal event
    pub timeout: Duration,
    /// Timeout for plain request/response calls
    pub request_timeout: Duration,
    /// Half-width of the subtitle window around each keyframe (seconds)
    pub context_window_secs: f64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:3004".to_string(),
            timeout: Duration::from_secs(600),
            request_timeout: Duration::from_secs(60),
            context_window_secs: 5.0,
        }
    }
}

impl TranscriptionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: std::env::var("TRANSCRIPTION_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.enabled),
            base_url: std::env::var("TRANSCRIPTION_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("TRANSCRIPTION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            request_timeout: std::env::var("TRANSCRIPTION_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            context_window_secs: std::env::var("TRANSCRIPTION_CONTEXT_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|w: &f64| w.is_finite() && *w >= 0.0)
                .unwrap_or(defaults.context_window_secs),
        }
    }
}
