//! SRT and WebVTT rendering of transcript segments.

use vlens_models::TranscriptSegment;

/// Subtitle file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::Vtt),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Srt => "application/x-subrip; charset=utf-8",
            Self::Vtt => "text/vtt; charset=utf-8",
        }
    }

    pub fn render(&self, segments: &[TranscriptSegment]) -> String {
        match self {
            Self::Srt => to_srt(segments),
            Self::Vtt => to_vtt(segments),
        }
    }
}

/// Format seconds as `HH:MM:SS{sep}mmm`.
fn format_timestamp(seconds: f64, separator: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}{}{:03}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        separator,
        ms
    )
}

fn cue_time(segment: &TranscriptSegment, separator: char) -> String {
    format!(
        "{} --> {}",
        format_timestamp(segment.start, separator),
        format_timestamp(segment.end, separator)
    )
}

pub fn to_srt(segments: &[TranscriptSegment]) -> String {
    let mut lines = Vec::with_capacity(segments.len() * 4);
    for (i, segment) in segments.iter().enumerate() {
        lines.push((i + 1).to_string());
        lines.push(cue_time(segment, ','));
        lines.push(segment.text.trim().to_string());
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn to_vtt(segments: &[TranscriptSegment]) -> String {
    let mut lines = vec!["WEBVTT".to_string(), String::new()];
    for segment in segments {
        lines.push(cue_time(segment, '.'));
        lines.push(segment.text.trim().to_string());
        lines.push(String::new());
    }
    lines.join("\n")
}
