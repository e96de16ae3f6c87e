//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Arguments for grabbing frames out of a video with FFmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    seek: Option<f64>,
    frames: Option<u32>,
    video_only: bool,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            seek: None,
            frames: None,
            video_only: false,
        }
    }

    /// Seek before opening the input. Input seeking snaps to the nearest
    /// preceding keyframe and decodes forward, so it stays fast on long files.
    pub fn seek(mut self, seconds: f64) -> Self {
        self.seek = Some(seconds.max(0.0));
        self
    }

    /// Emit exactly one video frame.
    pub fn single_frame(mut self) -> Self {
        self.frames = Some(1);
        self
    }

    /// Drop audio, subtitle and data streams.
    pub fn video_only(mut self) -> Self {
        self.video_only = true;
        self
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-v", "error", "-nostdin"]
            .iter()
            .map(|a| a.to_string())
            .collect();

        if let Some(seek) = self.seek {
            args.push("-ss".into());
            args.push(format!("{:.3}", seek));
        }
        args.push("-i".into());
        args.push(self.input.to_string_lossy().into_owned());

        if self.video_only {
            args.extend(["-an", "-sn", "-dn"].map(String::from));
        }
        if let Some(frames) = self.frames {
            args.push("-frames:v".into());
            args.push(frames.to_string());
        }
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Runs an [`FfmpegCommand`], optionally under a wall-clock ceiling.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// The child is killed if the timeout elapses or the returned future is
    /// dropped.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let ffmpeg = check_ffmpeg()?;
        let args = cmd.build_args();
        debug!(args = %args.join(" "), "Spawning ffmpeg");

        let pending = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout_secs {
            None => pending.await?,
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), pending)
                .await
                .map_err(|_| {
                    warn!(timeout_secs = secs, "ffmpeg did not finish in time");
                    MediaError::Timeout(secs)
                })??,
        };

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(MediaError::ffmpeg_failed(
            output.status.code(),
            (!stderr.is_empty()).then_some(stderr),
        ))
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}
