//! Incremental parsing of the upstream SSE byte stream.
//!
//! The upstream endpoint emits `data: <json>` lines, one completion delta per
//! line, terminated by a `data: [DONE]` sentinel. Network chunks arrive with
//! arbitrary boundaries, so a [`LineParser`] reassembles complete lines before
//! [`decode_line`] interprets them.

use std::str::Utf8Error;

use serde::Deserialize;

/// End-of-stream sentinel carried inside the data channel.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Reassembles complete protocol lines from raw transport chunks.
///
/// Holds at most the tail of the input following the last newline, plus an
/// incomplete trailing UTF-8 sequence (at most 3 bytes) when a chunk boundary
/// splits a multi-byte character. A line is only emitted once its terminating
/// newline has been seen; a trailing partial line survives until the next
/// chunk or an explicit [`take_remainder`] call at end of stream.
///
/// [`take_remainder`]: LineParser::take_remainder
#[derive(Debug, Default)]
pub struct LineParser {
    buffer: String,
    pending: Vec<u8>,
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk and return every newly completed line.
    ///
    /// Transport chunks can split a multi-byte character; the undecodable
    /// tail is retained and completed by the next chunk. Genuinely invalid
    /// byte sequences are fatal for the streaming session; the caller is
    /// expected to terminate the stream.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, Utf8Error> {
        self.pending.extend_from_slice(chunk);

        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // An incomplete trailing sequence waits for the next chunk.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(e),
        };
        if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
            self.buffer.push_str(text);
        }
        self.pending.drain(..valid);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let rest = self.buffer.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buffer, rest);
            line.truncate(pos); // drop the newline
            lines.push(line);
        }

        Ok(lines)
    }

    /// Take any buffered partial line at end of stream.
    ///
    /// The parser itself never assumes EOF; the orchestrator calls this once
    /// after the upstream connection closes.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

/// A decoded upstream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    /// One incremental text fragment.
    Delta(String),
    /// The stream-termination sentinel.
    Done,
    /// A `data:` line whose payload failed to parse as JSON.
    Malformed(String),
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

/// Interpret one protocol line.
///
/// Lines without the `data:` prefix (comments, blank keep-alives) yield
/// `None`. Only the first choice of a multi-choice response is honored; an
/// absent or empty content field normalizes to an empty delta.
pub fn decode_line(line: &str) -> Option<DecodedEvent> {
    let line = line.trim();
    let payload = line.strip_prefix("data:")?.trim();

    if payload == DONE_SENTINEL {
        return Some(DecodedEvent::Done);
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => {
            let content = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .unwrap_or_default();
            Some(DecodedEvent::Delta(content))
        }
        Err(_) => Some(DecodedEvent::Malformed(line.to_string())),
    }
}
