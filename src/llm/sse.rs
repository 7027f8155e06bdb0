//! Server-sent event framing for streamed model responses

use super::LlmError;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;

const SSE_DELIMITER: &str = "\n\n";

/// Decode a raw byte stream into parsed SSE `data:` payloads.
///
/// `parser` receives the joined data lines of each event and may return
/// `Ok(None)` to skip it. A transport error ends the stream after it is
/// yielded. A trailing event without a final blank line is still delivered.
pub(crate) fn decode_sse<S, B, E, T, F>(bytes: S, parser: F) -> BoxStream<'static, Result<T, LlmError>>
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
    T: Send + 'static,
    F: Fn(&str) -> Result<Option<T>, LlmError> + Send + 'static,
{
    let decoder = Decoder {
        inner: bytes,
        state: SseState::default(),
        pending: VecDeque::new(),
        parser,
        finished: false,
    };

    stream::unfold(decoder, |mut d| async move {
        loop {
            if let Some(item) = d.pending.pop_front() {
                return Some((item, d));
            }
            if d.finished {
                return None;
            }
            match d.inner.next().await {
                Some(Ok(chunk)) => {
                    d.state.push_bytes(chunk.as_ref());
                    while let Some(event) = d.state.next_event() {
                        d.push_parsed(&event);
                    }
                }
                Some(Err(err)) => {
                    d.finished = true;
                    d.pending
                        .push_back(Err(LlmError::network(format!("Stream interrupted: {err}"))));
                }
                None => {
                    if let Some(tail) = d.state.take_tail() {
                        d.push_parsed(&tail);
                    }
                    d.finished = true;
                }
            }
        }
    })
    .boxed()
}

struct Decoder<S, T, F> {
    inner: S,
    state: SseState,
    pending: VecDeque<Result<T, LlmError>>,
    parser: F,
    finished: bool,
}

impl<S, T, F> Decoder<S, T, F>
where
    F: Fn(&str) -> Result<Option<T>, LlmError>,
{
    fn push_parsed(&mut self, event: &str) {
        if self.finished {
            return;
        }
        let Some(data) = event_data(event) else {
            return;
        };
        match (self.parser)(&data) {
            Ok(Some(item)) => self.pending.push_back(Ok(item)),
            Ok(None) => {}
            Err(err) => {
                self.finished = true;
                self.pending.push_back(Err(err));
            }
        }
    }
}

/// Join the `data:` lines of one event; `None` for comments and keep-alives
fn event_data(event: &str) -> Option<String> {
    let lines: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();

    if lines.is_empty() {
        return None;
    }
    let data = lines.join("\n");
    if data.trim() == "[DONE]" {
        return None;
    }
    Some(data)
}

#[derive(Default)]
struct SseState {
    buffer: String,
    utf8_buffer: Vec<u8>,
}

impl SseState {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.utf8_buffer.extend_from_slice(bytes);
        match std::str::from_utf8(&self.utf8_buffer) {
            Ok(text) => {
                self.buffer.push_str(text);
                self.utf8_buffer.clear();
            }
            Err(err) => self.consume_valid_prefix(err.valid_up_to()),
        }
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
    }

    fn consume_valid_prefix(&mut self, valid_up_to: usize) {
        if valid_up_to == 0 {
            return;
        }

        let valid = String::from_utf8_lossy(&self.utf8_buffer[..valid_up_to]);
        self.buffer.push_str(&valid);
        self.utf8_buffer.drain(..valid_up_to);
    }

    fn next_event(&mut self) -> Option<String> {
        let pos = self.buffer.find(SSE_DELIMITER)?;
        let end = pos + SSE_DELIMITER.len();
        Some(self.buffer.drain(..end).collect())
    }

    fn take_tail(&mut self) -> Option<String> {
        if self.buffer.trim().is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.buffer))
    }
}
