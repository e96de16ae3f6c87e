//! Frame decoding.

use async_trait::async_trait;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Seeks closer than this to the end of the stream are pulled back so the
/// demuxer still has a frame to return.
const END_SEEK_MARGIN_SECS: f64 = 0.05;

/// Random-access source of decoded frames.
///
/// One decoder belongs to one submission and is never shared.
#[async_trait]
pub trait FrameDecoder: Send {
    /// Duration of the stream in seconds.
    async fn duration(&mut self) -> MediaResult<f64>;

    /// Decode the frame displayed at `timestamp` seconds.
    async fn frame_at(&mut self, timestamp: f64) -> MediaResult<DynamicImage>;
}

/// Decoder backed by `ffprobe` and one `ffmpeg` process per seek.
///
/// Grabbed frames land in a private scratch directory that is removed when
/// the decoder is dropped.
pub struct FfmpegDecoder {
    source: PathBuf,
    scratch: TempDir,
    seek_timeout_secs: u64,
    info: Option<VideoInfo>,
    grabbed: usize,
}

impl FfmpegDecoder {
    pub fn open(source: impl AsRef<Path>, seek_timeout: Duration) -> MediaResult<Self> {
        let source = source.as_ref().to_path_buf();
        if !source.exists() {
            return Err(MediaError::FileNotFound(source));
        }
        let scratch = tempfile::Builder::new().prefix("vlens-frames-").tempdir()?;

        Ok(Self {
            source,
            scratch,
            seek_timeout_secs: seek_timeout.as_secs().max(1),
            info: None,
            grabbed: 0,
        })
    }

    async fn info(&mut self) -> MediaResult<&VideoInfo> {
        if self.info.is_none() {
            let info = probe_video(&self.source).await?;
            debug!(
                source = %self.source.display(),
                duration = info.duration,
                width = info.width,
                height = info.height,
                codec = %info.codec,
                "Probed video"
            );
            self.info = Some(info);
        }
        self.info
            .as_ref()
            .ok_or_else(|| MediaError::InvalidVideo("probe returned no data".to_string()))
    }
}

#[async_trait]
impl FrameDecoder for FfmpegDecoder {
    async fn duration(&mut self) -> MediaResult<f64> {
        Ok(self.info().await?.duration)
    }

    async fn frame_at(&mut self, timestamp: f64) -> MediaResult<DynamicImage> {
        let duration = self.duration().await?;
        let position = timestamp.min((duration - END_SEEK_MARGIN_SECS).max(0.0));

        self.grabbed += 1;
        let output = self.scratch.path().join(format!("frame_{}.png", self.grabbed));

        let cmd = FfmpegCommand::new(&self.source, &output)
            .seek(position)
            .video_only()
            .single_frame();

        FfmpegRunner::new()
            .with_timeout(self.seek_timeout_secs)
            .run(&cmd)
            .await
            .map_err(|e| match e {
                MediaError::Timeout(secs) => MediaError::SeekTimeout {
                    timestamp,
                    timeout_secs: secs,
                },
                MediaError::FfmpegFailed { stderr, .. } => MediaError::decode(format!(
                    "failed to decode frame at {:.3}s: {}",
                    timestamp,
                    stderr.unwrap_or_else(|| "ffmpeg error".to_string())
                )),
                other => other,
            })?;

        if !output.exists() {
            return Err(MediaError::decode(format!(
                "no frame available at {:.3}s",
                timestamp
            )));
        }

        let bytes = tokio::fs::read(&output).await?;
        let _ = tokio::fs::remove_file(&output).await;

        image::load_from_memory(&bytes)
            .map_err(|e| MediaError::decode(format!("unreadable frame at {:.3}s: {}", timestamp, e)))
    }
}
