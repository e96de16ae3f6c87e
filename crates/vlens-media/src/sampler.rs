//! Evenly spaced frame sampling.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use vlens_models::CandidateFrame;

use crate::decoder::FrameDecoder;
use crate::error::MediaResult;
use crate::hash::{dhash, DEFAULT_HASH_SIZE};

/// Clips no longer than this are sampled without the end-of-stream frame.
const SHORT_CLIP_SECS: f64 = 1.0;

/// Sampler configuration.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Number of candidate frames per video
    pub frame_count: usize,
    /// Maximum encoded width in pixels
    pub max_width: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Fingerprint grid size
    pub hash_size: u32,
    /// Per-seek ceiling
    pub seek_timeout: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            frame_count: 24,
            max_width: 1024,
            jpeg_quality: 80,
            hash_size: DEFAULT_HASH_SIZE,
            seek_timeout: Duration::from_secs(10),
        }
    }
}

impl SamplerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frame_count: std::env::var("VLENS_FRAME_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.frame_count),
            max_width: std::env::var("VLENS_FRAME_MAX_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|w: &u32| *w > 0)
                .unwrap_or(defaults.max_width),
            jpeg_quality: std::env::var("VLENS_JPEG_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|q: u8| q.clamp(1, 100))
                .unwrap_or(defaults.jpeg_quality),
            hash_size: std::env::var("VLENS_HASH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|s: &u32| *s > 0)
                .unwrap_or(defaults.hash_size),
            seek_timeout: std::env::var("VLENS_SEEK_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.seek_timeout),
        }
    }
}

/// Timestamps of `n` evenly spaced samples across `[0, duration]`.
///
/// The last sample sits exactly on `duration` for clips longer than one
/// second; shorter clips drop it since the final frame is often missing.
pub fn sample_timestamps(duration: f64, n: usize) -> Vec<f64> {
    if n == 0 || !duration.is_finite() {
        return Vec::new();
    }
    let duration = duration.max(0.0);
    if n == 1 {
        return vec![0.0];
    }

    let step = duration / (n - 1) as f64;
    let mut timestamps: Vec<f64> = (0..n - 1).map(|i| i as f64 * step).collect();
    if duration > SHORT_CLIP_SECS {
        timestamps.push(duration);
    }
    timestamps
}

/// Downscale so width ≤ `max_width`, never upscaling, and encode as JPEG.
///
/// Returns the encoded bytes and the encoded dimensions.
pub fn encode_frame(
    image: &DynamicImage,
    max_width: u32,
    quality: u8,
) -> MediaResult<(Vec<u8>, u32, u32)> {
    let (width, height) = image.dimensions();
    let scaled;
    let image = if width > max_width {
        let new_height = ((height as u64 * max_width as u64) / width as u64).max(1) as u32;
        scaled = image.resize_exact(max_width, new_height, FilterType::Triangle);
        &scaled
    } else {
        image
    };

    let rgb = image.to_rgb8();
    let (w, h) = rgb.dimensions();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode(
        rgb.as_raw(),
        w,
        h,
        ColorType::Rgb8,
    )?;
    Ok((buf, w, h))
}

/// Extracts candidate frames from a decoder.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    config: SamplerConfig,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample, downscale, encode and fingerprint frames in timestamp order.
    ///
    /// Any decode failure aborts the whole sampling run.
    pub async fn sample<D>(&self, decoder: &mut D) -> MediaResult<Vec<CandidateFrame>>
    where
        D: FrameDecoder + ?Sized,
    {
        let start = Instant::now();
        let duration = decoder.duration().await?;
        let timestamps = sample_timestamps(duration, self.config.frame_count);
        let mut frames = Vec::with_capacity(timestamps.len());

        for timestamp in timestamps {
            let image = decoder.frame_at(timestamp).await?;
            let (encoded_image, width, height) =
                encode_frame(&image, self.config.max_width, self.config.jpeg_quality)?;
            let fingerprint = dhash(&image, self.config.hash_size);

            debug!(
                timestamp = timestamp,
                bytes = encoded_image.len(),
                fingerprint = %fingerprint,
                "Sampled frame"
            );

            frames.push(CandidateFrame {
                timestamp,
                encoded_image,
                width,
                height,
                fingerprint,
            });
        }

        metrics::histogram!("vlens_frame_sampling_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        info!(
            duration = duration,
            frames = frames.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sampled candidate frames"
        );

        Ok(frames)
    }
}
