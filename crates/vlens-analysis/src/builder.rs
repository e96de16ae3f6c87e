//! Budget-aware construction of multimodal analysis requests.
//!
//! `build_request` is a pure sizing step; `plan_request` drives it through a
//! bounded shrink loop.

use serde::Serialize;
use tracing::{debug, warn};
use vlens_models::{FrameRef, Keyframe};

use crate::error::{AnalysisError, AnalysisResult};
use crate::policy::RequestPolicy;

/// Body sent to the analysis service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub instructions: String,
    pub images: Vec<FrameRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_context: Option<String>,
}

/// A request that fits the budget, serialized once.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub body: String,
    pub size_bytes: usize,
    /// Timestamps of the submitted frames, in request order
    pub timestamps: Vec<f64>,
    pub shrink_attempts: u32,
}

impl PreparedRequest {
    pub fn frame_count(&self) -> usize {
        self.timestamps.len()
    }
}

/// Result of one sizing step.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Ready(PreparedRequest),
    /// Over budget; retry with `new_count` frames.
    ShrinkAndRetry { new_count: usize, size_bytes: usize },
    /// Over budget with a single frame left.
    CannotShrink { size_bytes: usize },
}

/// Indices of `count` frames spread evenly over `len`, always including the
/// first and last.
pub fn resample_indices(len: usize, count: usize) -> Vec<usize> {
    if len == 0 || count == 0 {
        return Vec::new();
    }
    if count >= len {
        return (0..len).collect();
    }
    if count == 1 {
        return vec![0];
    }

    let step = (len - 1) as f64 / (count - 1) as f64;
    let mut indices: Vec<usize> = (0..count)
        .map(|i| ((i as f64 * step).round() as usize).min(len - 1))
        .collect();
    indices.dedup();
    indices
}

/// Serialize `target_count` frames resampled from `frames` and check the
/// result against the budget.
pub fn build_request(
    frames: &[Keyframe],
    target_count: usize,
    instructions: &str,
    prior_context: Option<&str>,
    policy: &RequestPolicy,
) -> AnalysisResult<BuildOutcome> {
    let selected: Vec<&Keyframe> = resample_indices(frames.len(), target_count)
        .into_iter()
        .map(|i| &frames[i])
        .collect();

    let request = AnalysisRequest {
        instructions: instructions.to_string(),
        images: selected.iter().map(|k| FrameRef::from(*k)).collect(),
        prior_context: prior_context
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string),
    };

    let body = serde_json::to_string(&request)?;
    let size_bytes = body.len();

    if size_bytes <= policy.budget_bytes {
        return Ok(BuildOutcome::Ready(PreparedRequest {
            body,
            size_bytes,
            timestamps: selected.iter().map(|k| k.timestamp).collect(),
            shrink_attempts: 0,
        }));
    }

    Ok(match policy.shrink_count(selected.len()) {
        Some(new_count) => BuildOutcome::ShrinkAndRetry {
            new_count,
            size_bytes,
        },
        None => BuildOutcome::CannotShrink { size_bytes },
    })
}

/// Build the largest request that fits the budget within the policy's
/// attempt bound.
pub fn plan_request(
    frames: &[Keyframe],
    instructions: &str,
    prior_context: Option<&str>,
    policy: &RequestPolicy,
) -> AnalysisResult<PreparedRequest> {
    let mut count = frames.len();
    let mut attempts = 0u32;

    loop {
        let (size_bytes, next) = match build_request(frames, count, instructions, prior_context, policy)? {
            BuildOutcome::Ready(mut request) => {
                request.shrink_attempts = attempts;
                debug!(
                    frames = request.frame_count(),
                    size_bytes = request.size_bytes,
                    attempts,
                    "Analysis request fits budget"
                );
                return Ok(request);
            }
            BuildOutcome::ShrinkAndRetry {
                new_count,
                size_bytes,
            } => (size_bytes, Some(new_count)),
            BuildOutcome::CannotShrink { size_bytes } => (size_bytes, None),
        };

        let next = match next {
            Some(next) if attempts < policy.max_shrink_attempts => next,
            _ => {
                return Err(AnalysisError::PayloadTooLarge {
                    size_bytes,
                    frame_count: count.min(frames.len()),
                    budget: policy.budget_bytes,
                })
            }
        };

        warn!(
            size_bytes,
            budget = policy.budget_bytes,
            from = count,
            to = next,
            "Analysis payload over budget, shrinking"
        );
        metrics::counter!("vlens_analysis_shrinks_total").increment(1);
        attempts += 1;
        count = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlens_models::Fingerprint;

    /// Frames whose base64 encoding is exactly `b64_len` characters.
    fn frames(n: usize, b64_len: usize) -> Vec<Keyframe> {
        (0..n)
            .map(|i| Keyframe {
                timestamp: i as f64,
                encoded_image: vec![0u8; b64_len / 4 * 3],
                fingerprint: Fingerprint::from_u64(i as u64),
                subtitle_context: None,
            })
            .collect()
    }

    #[test]
    fn test_resample_indices() {
        assert_eq!(resample_indices(10, 10), (0..10).collect::<Vec<_>>());
        assert_eq!(resample_indices(10, 20).len(), 10);
        assert_eq!(resample_indices(10, 1), vec![0]);
        assert_eq!(resample_indices(10, 2), vec![0, 9]);
        assert_eq!(resample_indices(35, 28).len(), 28);
        assert!(resample_indices(0, 5).is_empty());

        let idx = resample_indices(35, 22);
        assert_eq!(idx.len(), 22);
        assert_eq!(idx[0], 0);
        assert_eq!(*idx.last().unwrap(), 34);
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_ready_when_under_budget() {
        let policy = RequestPolicy::default();
        let outcome = build_request(&frames(3, 100), 3, "describe", Some("ctx"), &policy).unwrap();
        let BuildOutcome::Ready(request) = outcome else {
            panic!("expected Ready");
        };
        assert_eq!(request.frame_count(), 3);
        assert_eq!(request.size_bytes, request.body.len());

        let json: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(json["instructions"], "describe");
        assert_eq!(json["priorContext"], "ctx");
        assert_eq!(json["images"][0]["mimeType"], "image/jpeg");
    }

    #[test]
    fn test_blank_prior_context_omitted() {
        let outcome =
            build_request(&frames(1, 4), 1, "x", Some("  "), &RequestPolicy::default()).unwrap();
        let BuildOutcome::Ready(request) = outcome else {
            panic!("expected Ready");
        };
        assert!(!request.body.contains("priorContext"));
    }

    #[test]
    fn test_shrink_sequence_35_to_22() {
        let frames = frames(35, 1_000_000);
        let policy = RequestPolicy {
            budget_bytes: 28_000_000,
            ..RequestPolicy::default()
        };

        let first = build_request(&frames, 35, "describe", None, &policy).unwrap();
        let BuildOutcome::ShrinkAndRetry { new_count, size_bytes } = first else {
            panic!("expected shrink");
        };
        assert_eq!(new_count, 28);
        assert!(size_bytes > 35_000_000);

        let second = build_request(&frames, 28, "describe", None, &policy).unwrap();
        let BuildOutcome::ShrinkAndRetry { new_count, size_bytes } = second else {
            panic!("expected second shrink");
        };
        assert_eq!(new_count, 22);
        assert!(size_bytes > 28_000_000 && size_bytes < 29_000_000);

        let planned = plan_request(&frames, "describe", None, &policy).unwrap();
        assert_eq!(planned.frame_count(), 22);
        assert_eq!(planned.shrink_attempts, 2);
        assert!(planned.size_bytes <= policy.budget_bytes);
        assert!(planned.size_bytes > 22_000_000);
        assert_eq!(planned.timestamps[0], 0.0);
        assert_eq!(*planned.timestamps.last().unwrap(), 34.0);
    }

    #[test]
    fn test_payload_too_large_after_attempt_bound() {
        let frames = frames(10, 1_000_000);
        let policy = RequestPolicy {
            budget_bytes: 2_500_000,
            shrink_ratio: 0.8,
            max_shrink_attempts: 2,
        };

        // 10 -> 8 -> 6, and 6 frames still do not fit.
        let err = plan_request(&frames, "describe", None, &policy).unwrap_err();
        match err {
            AnalysisError::PayloadTooLarge {
                size_bytes,
                frame_count,
                budget,
            } => {
                assert_eq!(frame_count, 6);
                assert_eq!(budget, 2_500_000);
                assert!(size_bytes > budget);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_single_oversized_frame() {
        let frames = frames(1, 1_000_000);
        let policy = RequestPolicy {
            budget_bytes: 10_000,
            ..RequestPolicy::default()
        };
        let err = plan_request(&frames, "describe", None, &policy).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::PayloadTooLarge { frame_count: 1, .. }
        ));
    }

    #[test]
    fn test_plan_never_exceeds_budget() {
        for budget in [500usize, 5_000, 50_000, 500_000] {
            let frames = frames(30, 4_000);
            let policy = RequestPolicy {
                budget_bytes: budget,
                ..RequestPolicy::default()
            };
            match plan_request(&frames, "describe", None, &policy) {
                Ok(request) => {
                    assert!(request.size_bytes <= budget);
                    assert!(request.shrink_attempts <= policy.max_shrink_attempts);
                }
                Err(AnalysisError::PayloadTooLarge { size_bytes, .. }) => {
                    assert!(size_bytes > budget)
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
    }
}
