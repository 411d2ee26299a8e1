//! Typed job stream events and the SSE wire parser.
//!
//! The executor pushes named events over `text/event-stream`:
//!
//! ```text
//! event: chunk
//! data: {"text": "Hel"}
//!
//! event: done
//! data: {"result": {"text": "Hello world"}}
//! ```
//!
//! `chunk` payloads carry the *running total*, not a delta; the client
//! replaces displayed content rather than concatenating. A terminal event
//! (`done`, `error`, `cancelled`) is always the last one processed for a job.

use serde::Deserialize;

use super::types::JobResult;

/// One decoded stream event for a job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobEvent {
    /// Cumulative partial text; each chunk supersedes the previous one.
    Chunk { text: String },
    /// Terminal success.
    Done { result: JobResult },
    /// Terminal failure, message surfaced on the owning block.
    Error { message: String },
    /// Terminal cancellation; the owning block returns to Idle.
    Cancelled,
}

impl JobEvent {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk { .. })
    }

    /// Decode a parsed SSE frame. Unknown event names and malformed payloads
    /// yield `None` and are skipped by the reader.
    pub fn from_frame(frame: &SseFrame) -> Option<Self> {
        match frame.event.as_str() {
            "chunk" => {
                #[derive(Deserialize)]
                struct ChunkData {
                    text: String,
                }
                let data: ChunkData = serde_json::from_str(&frame.data).ok()?;
                Some(JobEvent::Chunk { text: data.text })
            }
            "done" => {
                #[derive(Deserialize)]
                struct DoneData {
                    result: JobResult,
                }
                let data: DoneData = serde_json::from_str(&frame.data).ok()?;
                Some(JobEvent::Done {
                    result: data.result,
                })
            }
            "error" => {
                #[derive(Deserialize)]
                struct ErrorData {
                    error: String,
                }
                let message = serde_json::from_str::<ErrorData>(&frame.data)
                    .map(|d| d.error)
                    .unwrap_or_else(|_| "Job failed".to_string());
                Some(JobEvent::Error { message })
            }
            "cancelled" => Some(JobEvent::Cancelled),
            _ => None,
        }
    }
}

/// One raw Server-Sent Events frame: event name plus concatenated data lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental SSE decoder.
///
/// Network chunks arrive at arbitrary boundaries, so the parser buffers bytes
/// and emits a frame each time it sees the blank-line terminator. Comment
/// lines (leading `:`, used by the executor as keepalives) are dropped.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every frame completed by this chunk.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut frames = Vec::new();
        loop {
            let Some(end) = self.buffer.find("\n\n") else {
                break;
            };
            let raw: String = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_frame(&raw) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn parse_frame(raw: &str) -> Option<SseFrame> {
    let mut event = String::from("message");
    let mut data_lines: Vec<&str> = Vec::new();
    for line in raw.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event = value.trim_start().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim_start());
        }
        // Other fields (id, retry) are irrelevant to this protocol.
    }
    if data_lines.is_empty() && event == "message" {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_split_frames_across_chunks() {
        let mut parser = SseParser::new();
        let frames = parser.push(b"event: chunk\ndata: {\"te");
        assert!(frames.is_empty());
        let frames = parser.push(b"xt\": \"Hel\"}\n\nevent: chunk\ndata: {\"text\": \"Hello\"}\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(
            JobEvent::from_frame(&frames[1]),
            Some(JobEvent::Chunk {
                text: "Hello".into()
            })
        );
    }

    #[test]
    fn keepalive_comments_are_skipped() {
        let mut parser = SseParser::new();
        let frames = parser.push(b": keepalive\n\nevent: cancelled\ndata: {}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(JobEvent::from_frame(&frames[0]), Some(JobEvent::Cancelled));
    }

    #[test]
    fn done_frame_carries_result() {
        let frame = SseFrame {
            event: "done".into(),
            data: r#"{"result": {"imageId": "7", "imageUrl": "/api/images/7"}}"#.into(),
        };
        match JobEvent::from_frame(&frame) {
            Some(JobEvent::Done {
                result: JobResult::Image { image_id, .. },
            }) => assert_eq!(image_id, "7"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn error_frame_with_malformed_payload_falls_back() {
        let frame = SseFrame {
            event: "error".into(),
            data: "not json".into(),
        };
        assert_eq!(
            JobEvent::from_frame(&frame),
            Some(JobEvent::Error {
                message: "Job failed".into()
            })
        );
    }

    #[test]
    fn unknown_event_names_are_ignored() {
        let frame = SseFrame {
            event: "telemetry".into(),
            data: "{}".into(),
        };
        assert_eq!(JobEvent::from_frame(&frame), None);
    }
}
