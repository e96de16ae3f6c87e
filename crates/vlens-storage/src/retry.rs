//! Retry policy with capped exponential backoff.

use std::time::Duration;

use tracing::{info_span, warn, Instrument};

use crate::error::StorageResult;
use crate::metrics::record_retry;

// =============================================================================
// Configuration
// =============================================================================

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: std::env::var("PRIMARY_STORE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            base_delay_ms: std::env::var("PRIMARY_STORE_RETRY_BASE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.base_delay_ms),
            max_delay_ms: std::env::var("PRIMARY_STORE_RETRY_MAX_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_delay_ms),
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Execute an async operation with retry.
///
/// Retries network errors, 429 and 5xx responses. Everything else is
/// returned immediately.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> StorageResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = StorageResult<T>>,
{
    let mut attempt = 0;

    loop {
        let span = info_span!("primary_store_retry", operation = %operation, attempt = attempt + 1);

        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = calculate_delay(config, attempt);

                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Primary store operation failed, retrying: {}",
                    e
                );

                record_retry(operation);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Calculate retry delay: `base * 2^attempt`, capped.
fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp_delay = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(exp_delay.min(config.max_delay_ms))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_calculate_delay() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        };
        assert_eq!(calculate_delay(&config, 0), Duration::from_millis(100));
        assert_eq!(calculate_delay(&config, 2), Duration::from_millis(400));
        assert_eq!(calculate_delay(&config, 10), Duration::from_millis(1000));
        assert_eq!(calculate_delay(&config, 70), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&RetryConfig::default(), "list", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StorageError::primary_unavailable("503"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_client_errors() {
        let calls = AtomicU32::new(0);
        let result: StorageResult<()> = with_retry(&RetryConfig::default(), "get", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::from_http_status(400, "bad"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
