//! Keyframe deduplication over a temporally ordered frame sequence.

use vlens_models::{CandidateFrame, Fingerprint, Keyframe};

/// Default Hamming-distance threshold for 64-bit fingerprints.
pub const DEFAULT_THRESHOLD: u32 = 5;

/// Outcome of considering one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupDecision {
    pub keep: bool,
    /// Distance to the reference fingerprint; `None` for the first frame.
    pub distance: Option<u32>,
}

/// Streaming deduplicator.
///
/// The first frame is always kept. A later frame is kept, and becomes the
/// new reference, only when its distance to the last kept fingerprint is
/// strictly greater than the threshold.
#[derive(Debug, Clone)]
pub struct KeyframeDeduplicator {
    threshold: u32,
    reference: Option<Fingerprint>,
}

impl KeyframeDeduplicator {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            reference: None,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn consider(&mut self, fingerprint: &Fingerprint) -> DedupDecision {
        let Some(reference) = &self.reference else {
            self.reference = Some(fingerprint.clone());
            return DedupDecision {
                keep: true,
                distance: None,
            };
        };

        let distance = reference.hamming_distance(fingerprint);
        let keep = distance > self.threshold;
        if keep {
            self.reference = Some(fingerprint.clone());
        }
        DedupDecision {
            keep,
            distance: Some(distance),
        }
    }

    pub fn reset(&mut self) {
        self.reference = None;
    }
}

/// Reduce candidates to an order-preserving subsequence of keyframes.
pub fn deduplicate(frames: Vec<CandidateFrame>, threshold: u32) -> Vec<Keyframe> {
    let mut dedup = KeyframeDeduplicator::new(threshold);
    frames
        .into_iter()
        .filter(|frame| dedup.consider(&frame.fingerprint).keep)
        .map(Keyframe::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: usize, bits: u64) -> CandidateFrame {
        CandidateFrame {
            timestamp: index as f64,
            encoded_image: vec![index as u8],
            width: 1,
            height: 1,
            fingerprint: Fingerprint::from_u64(bits),
        }
    }

    /// Small xorshift so property checks cover many sequences without a
    /// randomness dependency.
    fn next(state: &mut u64) -> u64 {
        *state ^= *state << 13;
        *state ^= *state >> 7;
        *state ^= *state << 17;
        *state
    }

    /// Flip `count` low bits of `base`.
    fn flip(base: u64, count: u32) -> u64 {
        if count == 0 {
            base
        } else {
            base ^ (u64::MAX >> (64 - count))
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(deduplicate(Vec::new(), DEFAULT_THRESHOLD).is_empty());
    }

    #[test]
    fn test_first_frame_always_kept() {
        let kept = deduplicate(vec![frame(0, 0), frame(1, 0), frame(2, 0)], 0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp, 0.0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut dedup = KeyframeDeduplicator::new(5);
        assert!(dedup.consider(&Fingerprint::from_u64(0)).keep);

        let at = dedup.consider(&Fingerprint::from_u64(flip(0, 5)));
        assert_eq!(at, DedupDecision { keep: false, distance: Some(5) });

        let above = dedup.consider(&Fingerprint::from_u64(flip(0, 6)));
        assert_eq!(above, DedupDecision { keep: true, distance: Some(6) });
    }

    #[test]
    fn test_compares_against_last_kept_not_previous() {
        // Each step drifts by 3 bits: no single step exceeds 5, but the
        // accumulated drift from the reference does.
        let frames = vec![
            frame(0, 0),
            frame(1, flip(0, 3)),
            frame(2, flip(0, 6)),
            frame(3, flip(0, 9)),
        ];
        let kept: Vec<f64> = deduplicate(frames, 5).iter().map(|k| k.timestamp).collect();
        assert_eq!(kept, vec![0.0, 2.0]);
    }

    #[test]
    fn test_subsequence_properties() {
        let mut seed = 0x9E37_79B9_7F4A_7C15u64;
        for threshold in [0u32, 1, 5, 12, 32, 64] {
            for _ in 0..50 {
                let len = (next(&mut seed) % 30) as usize;
                let frames: Vec<_> = (0..len)
                    .map(|i| {
                        // Mix near-duplicates and fresh scenes.
                        let bits = if next(&mut seed) % 3 == 0 {
                            flip(0xAAAA_0000_FFFF_0000, (next(&mut seed) % 4) as u32)
                        } else {
                            next(&mut seed)
                        };
                        frame(i, bits)
                    })
                    .collect();
                let fingerprints: Vec<_> = frames.iter().map(|f| f.fingerprint.clone()).collect();

                let kept = deduplicate(frames, threshold);

                if len == 0 {
                    assert!(kept.is_empty());
                    continue;
                }
                assert_eq!(kept[0].timestamp, 0.0);
                assert!(kept.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
                for pair in kept.windows(2) {
                    assert!(pair[0].fingerprint.hamming_distance(&pair[1].fingerprint) > threshold);
                }
                for k in &kept {
                    assert_eq!(k.fingerprint, fingerprints[k.timestamp as usize]);
                }
            }
        }
    }

    #[test]
    fn test_twenty_four_frames_threshold_five() {
        // Three scenes of eight frames; inside a scene frames differ by at
        // most two bits from the scene's first frame.
        let scenes = [0x0000_0000_0000_0000u64, 0xFFFF_0000_FFFF_0000, 0x0F0F_0F0F_0F0F_0F0F];
        let mut frames: Vec<_> = (0..24)
            .map(|i| frame(i, flip(scenes[i / 8], (i % 3) as u32)))
            .collect();

        let kept = deduplicate(frames.clone(), DEFAULT_THRESHOLD);
        let kept_ts: Vec<f64> = kept.iter().map(|k| k.timestamp).collect();
        assert_eq!(kept_ts, vec![0.0, 8.0, 16.0]);
        assert!(!kept_ts.contains(&23.0));

        // A distinct closing shot is kept as frame 23.
        frames[23] = frame(23, !scenes[2]);
        let kept = deduplicate(frames, DEFAULT_THRESHOLD);
        assert_eq!(kept.first().unwrap().timestamp, 0.0);
        assert_eq!(kept.last().unwrap().timestamp, 23.0);
    }
}
