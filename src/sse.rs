//! Server-sent events framing.
//!
//! [`SseFrame`] is what the generation relay emits to HTTP clients; the web
//! layer turns each one into an axum [`Event`] for the wire. [`SseDecoder`]
//! splits a provider's `text/event-stream` body back into frames: a frame is
//! a run of `field: value` lines terminated by a blank line, lines starting
//! with `:` are comments, and multi-line data is carried as repeated `data:`
//! lines.

use axum::response::sse::Event;

/// A single server-sent event or comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// `: text`, ignored by clients; used as a connection marker.
    Comment(String),
    /// `event: name` with `data` split across `data:` lines.
    Event { name: String, data: String },
}

impl SseFrame {
    pub fn comment(text: &str) -> Self {
        SseFrame::Comment(text.into())
    }

    pub fn event(name: &str, data: impl Into<String>) -> Self {
        SseFrame::Event {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Event name, or `None` for comments.
    pub fn name(&self) -> Option<&str> {
        match self {
            SseFrame::Comment(_) => None,
            SseFrame::Event { name, .. } => Some(name),
        }
    }

    pub fn data(&self) -> Option<&str> {
        match self {
            SseFrame::Comment(_) => None,
            SseFrame::Event { data, .. } => Some(data),
        }
    }
}

impl From<SseFrame> for Event {
    fn from(frame: SseFrame) -> Self {
        match frame {
            SseFrame::Comment(text) => Event::default().comment(text.replace(['\r', '\n'], " ")),
            SseFrame::Event { name, data } => Event::default()
                .event(name)
                .data(data.replace("\r\n", "\n")),
        }
    }
}

/// Incremental `text/event-stream` decoder.
///
/// Feed raw body chunks with [`push`](Self::push); complete frames are
/// returned as soon as their terminating blank line arrives. Comments are
/// dropped. Chunk boundaries may fall anywhere, including inside a UTF-8
/// sequence or between `\r` and `\n`.
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

    /// Consume a chunk and return every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(frame) = self.line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing frame that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            let line = line.trim_end_matches('\r').to_string();
            if let Some(frame) = self.line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Option<SseFrame> {
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
        Some(SseFrame::Event {
            name: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}
