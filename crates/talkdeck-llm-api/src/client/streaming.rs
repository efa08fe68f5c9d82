use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::pin::Pin;

use talkdeck_logging::log_stream_chunk;

use crate::error::ApiError;

/// Terminates a chat completion stream
pub const DONE_SENTINEL: &str = "data: [DONE]";

const DATA_PREFIX: &str = "data: ";

/// Event of a streamed chat completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A new fragment of assistant text, with everything received so far
    Chunk { delta: String, content: String },
    /// The stream ended; sent exactly once, last
    Complete { content: String },
}

/// Stream of chat completion events
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ApiError>> + Send>>;

/// A decoded SSE line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Delta(String),
    Done,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Incremental decoder for `data: <json>` chat completion frames.
///
/// Bytes may be split anywhere, including inside a line or inside a UTF-8
/// sequence; incomplete input is carried until the next `feed`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending_bytes: Vec<u8>,
    buffer: String,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the sentinel has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decode a network read, returning the frames its complete lines carry
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        if self.done {
            return Vec::new();
        }

        self.pending_bytes.extend_from_slice(bytes);
        self.decode_pending();

        let mut frames = Vec::new();
        while let Some(line_end) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=line_end).collect();
            if let Some(frame) = self.parse_line(&line) {
                let is_done = frame == SseFrame::Done;
                frames.push(frame);
                if is_done {
                    self.buffer.clear();
                    self.pending_bytes.clear();
                    break;
                }
            }
        }
        frames
    }

    /// Flush at end of body: a final line without a newline is still decoded
    pub fn finish(&mut self) -> Vec<SseFrame> {
        if self.done {
            return Vec::new();
        }

        if !self.pending_bytes.is_empty() {
            let rest = std::mem::take(&mut self.pending_bytes);
            self.buffer.push_str(&String::from_utf8_lossy(&rest));
        }

        let line = std::mem::take(&mut self.buffer);
        self.parse_line(&line).into_iter().collect()
    }

    /// Move every complete UTF-8 sequence from `pending_bytes` into `buffer`
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending_bytes.clear();
                    return;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending_bytes[..valid_up_to]));
                    match e.error_len() {
                        // Truncated sequence at the end: wait for more bytes
                        None => {
                            self.pending_bytes.drain(..valid_up_to);
                            return;
                        }
                        Some(invalid_len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending_bytes.drain(..valid_up_to + invalid_len);
                        }
                    }
                }
            }
        }
    }

    fn parse_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if line == DONE_SENTINEL {
            self.done = true;
            return Some(SseFrame::Done);
        }

        let data = line.strip_prefix(DATA_PREFIX)?;
        log::trace!("SSE data: {}", data);

        match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content)
                .filter(|content| !content.is_empty())
                .map(SseFrame::Delta),
            Err(e) => {
                log::warn!("Skipping malformed stream frame ({}): {}", e, line);
                None
            }
        }
    }
}

/// Turn a chunked response body into chat completion events.
///
/// Ends with exactly one `Complete` when the sentinel arrives or the body
/// ends, or with a single error if reading the body fails.
pub fn decode_chat_stream<S, B, E>(byte_stream: S, verbose: bool) -> ChatStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    Box::pin(stream! {
        let mut byte_stream = Box::pin(byte_stream);
        let mut decoder = SseDecoder::new();
        let mut full_content = String::new();
        let mut chunk_counter = 0usize;

        while let Some(chunk_result) = byte_stream.next().await {
            let bytes = match chunk_result {
                Ok(bytes) => bytes,
                Err(e) => {
                    let err: ApiError = e.into();
                    log::error!("Error reading chat stream: {}", err);
                    yield Err(err);
                    return;
                }
            };

            for frame in decoder.feed(bytes.as_ref()) {
                match frame {
                    SseFrame::Delta(delta) => {
                        chunk_counter += 1;
                        log_stream_chunk(chunk_counter, &delta, verbose);
                        full_content.push_str(&delta);
                        yield Ok(StreamEvent::Chunk { delta, content: full_content.clone() });
                    }
                    SseFrame::Done => {
                        log::debug!("Chat stream completed after {} chunks", chunk_counter);
                        yield Ok(StreamEvent::Complete { content: full_content });
                        return;
                    }
                }
            }
        }

        for frame in decoder.finish() {
            if let SseFrame::Delta(delta) = frame {
                chunk_counter += 1;
                log_stream_chunk(chunk_counter, &delta, verbose);
                full_content.push_str(&delta);
                yield Ok(StreamEvent::Chunk { delta, content: full_content.clone() });
            }
        }

        log::debug!("Chat stream ended after {} chunks", chunk_counter);
        yield Ok(StreamEvent::Complete { content: full_content });
    })
}

/// Drive a chat stream into callbacks.
///
/// `on_chunk(delta, content)` runs per fragment; then exactly one of
/// `on_complete(content)` or `on_error(error)` runs.
pub async fn drive_chat_stream<C, F, R>(mut stream: ChatStream, mut on_chunk: C, on_complete: F, on_error: R)
where
    C: FnMut(&str, &str),
    F: FnOnce(&str),
    R: FnOnce(&ApiError),
{
    while let Some(event) = stream.next().await {
        match event {
            Ok(StreamEvent::Chunk { delta, content }) => on_chunk(&delta, &content),
            Ok(StreamEvent::Complete { content }) => {
                on_complete(&content);
                return;
            }
            Err(e) => {
                on_error(&e);
                return;
            }
        }
    }
}
