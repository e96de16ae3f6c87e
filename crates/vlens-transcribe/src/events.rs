//! Typed transcription events parsed from a `text/event-stream` body.

use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::debug;

use crate::error::{TranscribeError, TranscribeResult};

/// Lazy, finite sequence of events for one transcription job.
///
/// Dropping the subscription closes the underlying connection.
pub type EventSubscription = Pin<Box<dyn Stream<Item = TranscribeResult<TranscriptionEvent>> + Send>>;

/// Event emitted by the transcription backend.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionEvent {
    Connected,
    Progress {
        stage: Option<String>,
        percent: Option<f64>,
    },
    Complete {
        segment_count: usize,
        duration: Option<f64>,
        language: Option<String>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Default, Deserialize)]
struct ProgressData {
    stage: Option<String>,
    percent: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteData {
    #[serde(default)]
    segment_count: usize,
    duration: Option<f64>,
    language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorData {
    #[serde(alias = "message")]
    error: Option<String>,
}

impl TranscriptionEvent {
    /// Map a raw SSE frame to an event. Unknown event names yield `None`.
    pub fn from_frame(frame: &SseFrame) -> Option<Self> {
        match frame.event.as_str() {
            "connected" => Some(Self::Connected),
            "progress" => {
                let data: ProgressData = serde_json::from_str(&frame.data).unwrap_or_default();
                Some(Self::Progress {
                    stage: data.stage,
                    percent: data.percent,
                })
            }
            "complete" | "subtitle-complete" => {
                let data: CompleteData = serde_json::from_str(&frame.data).unwrap_or_default();
                Some(Self::Complete {
                    segment_count: data.segment_count,
                    duration: data.duration,
                    language: data.language,
                })
            }
            "error" | "subtitle-error" => {
                let message = serde_json::from_str::<ErrorData>(&frame.data)
                    .ok()
                    .and_then(|d| d.error)
                    .unwrap_or_else(|| frame.data.trim().to_string());
                let message = if message.is_empty() {
                    "transcription failed".to_string()
                } else {
                    message
                };
                Some(Self::Error { message })
            }
            other => {
                debug!(event = other, "Ignoring unknown transcription event");
                None
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes may arrive split at arbitrary boundaries, including inside a UTF-8
/// sequence; only complete lines are interpreted.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Flush a trailing frame that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

struct DecodeState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<TranscriptionEvent>,
    finished: bool,
}

impl<S> DecodeState<S> {
    fn queue(&mut self, frames: impl IntoIterator<Item = SseFrame>) {
        self.pending
            .extend(frames.into_iter().filter_map(|f| TranscriptionEvent::from_frame(&f)));
    }
}

/// Turn a byte stream into a typed event subscription.
pub fn event_stream<S, B, E>(bytes: S) -> EventSubscription
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TranscribeError> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let events = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(chunk.as_ref());
                    state.queue(frames);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.finished = true;
                    let tail = state.decoder.finish();
                    state.queue(tail);
                }
            }
        }
    });

    Box::pin(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    impl From<Infallible> for TranscribeError {
        fn from(e: Infallible) -> Self {
            match e {}
        }
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: prog").is_empty());
        assert!(decoder.push(b"ress\r\ndata: {\"percent\"").is_empty());
        let frames = decoder.push(b": 50}\r\n\r\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "progress".to_string(),
                data: "{\"percent\": 50}".to_string(),
            }]
        );
    }

    #[test]
    fn test_decoder_multiline_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keepalive\n\ndata: a\ndata: b\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "message");
        assert_eq!(frames[0].data, "a\nb");
    }

    #[test]
    fn test_decoder_flushes_unterminated_frame() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: complete\ndata: {}").is_empty());
        let frame = decoder.finish().unwrap();
        assert_eq!(frame.event, "complete");
        assert_eq!(frame.data, "{}");
    }

    #[test]
    fn test_event_mapping() {
        let frame = |event: &str, data: &str| SseFrame {
            event: event.to_string(),
            data: data.to_string(),
        };

        assert_eq!(
            TranscriptionEvent::from_frame(&frame("subtitle-complete", r#"{"segmentCount": 12}"#)),
            Some(TranscriptionEvent::Complete {
                segment_count: 12,
                duration: None,
                language: None,
            })
        );
        assert_eq!(
            TranscriptionEvent::from_frame(&frame("error", r#"{"error": "Conversion failed"}"#)),
            Some(TranscriptionEvent::Error {
                message: "Conversion failed".to_string()
            })
        );
        assert_eq!(
            TranscriptionEvent::from_frame(&frame("subtitle-error", "boom")),
            Some(TranscriptionEvent::Error {
                message: "boom".to_string()
            })
        );
        assert_eq!(TranscriptionEvent::from_frame(&frame("heartbeat", "{}")), None);
    }

    #[tokio::test]
    async fn test_event_stream_skips_unknown_events() {
        let body = "event: connected\ndata: {\"status\": \"connected\"}\n\n\
                    event: heartbeat\ndata: {}\n\n\
                    event: progress\ndata: {\"stage\": \"recognizing\", \"percent\": 70}\n\n\
                    event: complete\ndata: {\"segmentCount\": 3, \"language\": \"zh\"}\n\n";
        let chunks: Vec<Result<Vec<u8>, Infallible>> = body
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(c.to_vec()))
            .collect();

        let events: Vec<_> = event_stream(stream::iter(chunks))
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], TranscriptionEvent::Connected);
        assert_eq!(
            events[1],
            TranscriptionEvent::Progress {
                stage: Some("recognizing".to_string()),
                percent: Some(70.0),
            }
        );
        assert!(events[2].is_terminal());
    }
}
