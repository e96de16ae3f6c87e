//! Sampled frames and keyframes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// MIME type of encoded frame images.
pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// A frame produced by the sampler, before deduplication.
///
/// Never persisted.
#[derive(Debug, Clone)]
pub struct CandidateFrame {
    /// Position in the source video (seconds)
    pub timestamp: f64,
    /// Downscaled JPEG bytes
    pub encoded_image: Vec<u8>,
    /// Encoded width in pixels
    pub width: u32,
    /// Encoded height in pixels
    pub height: u32,
    /// Difference-hash fingerprint of the frame
    pub fingerprint: Fingerprint,
}

/// A frame retained after deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyframe {
    /// Position in the source video (seconds)
    pub timestamp: f64,
    /// JPEG bytes
    #[serde(with = "base64_bytes")]
    pub encoded_image: Vec<u8>,
    pub fingerprint: Fingerprint,
    /// Transcript text spoken around `timestamp`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_context: Option<String>,
}

impl Keyframe {
    /// Encoded image as standard base64.
    pub fn image_base64(&self) -> String {
        STANDARD.encode(&self.encoded_image)
    }

    /// Attach transcript context. Blank text is treated as no context.
    pub fn with_subtitle_context(mut self, context: Option<String>) -> Self {
        self.subtitle_context = context.filter(|text| !text.trim().is_empty());
        self
    }
}

impl From<CandidateFrame> for Keyframe {
    fn from(frame: CandidateFrame) -> Self {
        Self {
            timestamp: frame.timestamp,
            encoded_image: frame.encoded_image,
            fingerprint: frame.fingerprint,
            subtitle_context: None,
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(timestamp: f64) -> CandidateFrame {
        CandidateFrame {
            timestamp,
            encoded_image: vec![0xFF, 0xD8, 0xFF],
            width: 4,
            height: 2,
            fingerprint: Fingerprint::from_u64(7),
        }
    }

    #[test]
    fn test_keyframe_from_candidate() {
        let keyframe = Keyframe::from(candidate(2.5));
        assert_eq!(keyframe.timestamp, 2.5);
        assert_eq!(keyframe.image_base64(), "/9j/");
        assert!(keyframe.subtitle_context.is_none());
    }

    #[test]
    fn test_blank_subtitle_context_is_dropped() {
        let keyframe = Keyframe::from(candidate(0.0)).with_subtitle_context(Some("  ".into()));
        assert!(keyframe.subtitle_context.is_none());

        let keyframe = Keyframe::from(candidate(0.0)).with_subtitle_context(Some("hello".into()));
        assert_eq!(keyframe.subtitle_context.as_deref(), Some("hello"));
    }

    #[test]
    fn test_keyframe_serializes_image_as_base64() {
        let keyframe = Keyframe::from(candidate(1.0));
        let json = serde_json::to_value(&keyframe).unwrap();
        assert_eq!(json["encoded_image"], "/9j/");

        let back: Keyframe = serde_json::from_value(json).unwrap();
        assert_eq!(back.encoded_image, keyframe.encoded_image);
    }
}
