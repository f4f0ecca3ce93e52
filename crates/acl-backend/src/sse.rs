//! Server-Sent Events (SSE) decoding.
//!
//! Parses a byte stream into SSE events according to the W3C specification.

use crate::framing::{FramedStream, LineDecoder};

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The event type (from `event:` field). None if not specified.
    pub event_type: Option<String>,
    /// The last event id seen (from `id:` field).
    pub id: Option<String>,
    /// The event data (from `data:` field(s)).
    pub data: String,
}

/// Accumulates fields until a blank line dispatches the event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    event_type: Option<String>,
    id: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event_type = None;
            return None;
        }
        Some(SseEvent {
            event_type: self.event_type.take(),
            id: self.id.clone(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

impl LineDecoder for SseDecoder {
    type Item = SseEvent;

    fn decode_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment line
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // Ids containing NUL are ignored.
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn finish(&mut self) -> Option<SseEvent> {
        self.dispatch()
    }
}

/// Stream of SSE events decoded from a byte stream.
pub type SseStream<S> = FramedStream<S, SseDecoder>;

/// Create an SSE stream from a byte stream.
pub fn parse_sse_stream<S>(stream: S) -> SseStream<S> {
    FramedStream::new(stream, SseDecoder::default())
}
