//! Server-sent event framing.
//!
//! Frames are separated by a blank line (`\n\n`). Inside a frame only lines
//! starting with `data:` carry payload; everything else (comments, `event:`
//! lines, keep-alives) is dropped.

use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

pub const DATA_MARKER: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";
pub const DONE_FRAME: &str = "data: [DONE]\n\n";
const FRAME_DELIMITER: &str = "\n\n";

/// What to do with buffered text that never saw a closing delimiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailPolicy {
    /// Drop it. Well-behaved producers always end with a sentinel frame.
    #[default]
    Discard,
    /// Emit it as a best-effort final frame.
    Flush,
}

/// One blank-line-delimited unit of the event stream, delimiter excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    text: String,
}

impl StreamFrame {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Marked lines with the marker (and one following space) stripped.
    pub fn payloads(&self) -> impl Iterator<Item = &str> {
        self.text.lines().filter_map(strip_marker)
    }
}

pub fn strip_marker(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(DATA_MARKER)?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Incremental decoder from raw transport chunks to [`StreamFrame`]s.
///
/// Chunks may split anywhere, including inside a multi-byte character; the
/// undecoded bytes wait in `pending` until the rest arrives.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    buffer: String,
    tail_policy: TailPolicy,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tail_policy(tail_policy: TailPolicy) -> Self {
        Self {
            tail_policy,
            ..Self::default()
        }
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        let mut consumed = 0;
        while consumed < self.pending.len() {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = self.pending.len();
                }
                Err(error) => {
                    let valid_end = consumed + error.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[consumed..valid_end]));
                    match error.error_len() {
                        Some(invalid_len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + invalid_len;
                        }
                        // incomplete sequence at the end; wait for more bytes
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }

    pub fn next_frame(&mut self) -> Option<StreamFrame> {
        let boundary = self.buffer.find(FRAME_DELIMITER)?;
        let remaining = self.buffer.split_off(boundary + FRAME_DELIMITER.len());
        let mut frame = std::mem::replace(&mut self.buffer, remaining);
        frame.truncate(boundary);
        Some(StreamFrame::new(frame))
    }

    /// End of input. Returns the undelimited tail only under
    /// [`TailPolicy::Flush`]; call after `next_frame` has been drained.
    pub fn finish(mut self) -> Option<StreamFrame> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&rest));
        }
        if self.buffer.is_empty() {
            return None;
        }

        match self.tail_policy {
            TailPolicy::Discard => {
                tracing::debug!(
                    bytes = self.buffer.len(),
                    "discarding undelimited trailing frame"
                );
                None
            }
            TailPolicy::Flush => Some(StreamFrame::new(self.buffer)),
        }
    }

    /// Drop everything buffered so far.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.buffer.clear();
    }
}

/// Lazily turn a chunked byte stream into frames. A transport error is
/// yielded once and ends the sequence.
pub fn decode_frames<S, B, E>(
    chunks: S,
    tail_policy: TailPolicy,
) -> impl Stream<Item = Result<StreamFrame, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    async_stream::stream! {
        let mut decoder = FrameDecoder::with_tail_policy(tail_policy);
        futures_util::pin_mut!(chunks);

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => {
                    decoder.push_chunk(bytes.as_ref());
                    while let Some(frame) = decoder.next_frame() {
                        yield Ok(frame);
                    }
                }
                Err(error) => {
                    decoder.reset();
                    yield Err(error);
                    return;
                }
            }
        }

        if let Some(tail) = decoder.finish() {
            yield Ok(tail);
        }
    }
}

/// Producer side: a frame carrying one text fragment.
pub fn encode_delta(text: &str) -> String {
    format!("data: {}\n\n", serde_json::json!({ "delta": text }))
}

/// Producer side: a frame carrying a terminal error.
pub fn encode_error(message: &str) -> String {
    format!("data: {}\n\n", serde_json::json!({ "error": message }))
}
