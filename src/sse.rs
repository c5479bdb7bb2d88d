//! Incremental decoding of chat completion response bodies.
//!
//! Backends frame streamed records in two ways: as `data:` lines in the server-sent events
//! style, terminated by `data: [DONE]`, or as bare JSON objects one per line.  This module
//! reassembles lines across read boundaries and turns a stream of byte chunks into a stream
//! of [`StreamRecord`]s.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_MALFORMED_RECORDS, STREAM_RECORDS};
use crate::{ChatCompletionChunk, Result};

/// Marker that introduces an event-stream data line.
const DATA_PREFIX: &str = "data:";

/// Payload that terminates an event stream.
const DONE_MARKER: &str = "[DONE]";

/// One decoded unit of a response body.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    /// A record terminated by a newline.
    Chunk(ChatCompletionChunk),

    /// A complete JSON object left in the buffer when the body ended without a newline.
    Trailing(ChatCompletionChunk),

    /// A record that looked like JSON but did not parse.  Consumers skip these.
    Malformed {
        /// The offending JSON text.
        text: String,
        /// Why it failed to parse.
        error: String,
    },
}

/// How a single line of the body should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// The end-of-stream marker.
    Done,

    /// JSON text of one record.
    Json(&'a str),

    /// Anything else: blank lines, comments, `event:` fields.
    Ignored,
}

/// Classify one complete line.
pub fn classify_line(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if let Some(payload) = trimmed.strip_prefix(DATA_PREFIX) {
        let payload = payload.trim();
        if payload == DONE_MARKER {
            Line::Done
        } else if payload.is_empty() {
            Line::Ignored
        } else {
            Line::Json(payload)
        }
    } else if looks_like_object(trimmed) {
        Line::Json(trimmed)
    } else {
        Line::Ignored
    }
}

fn looks_like_object(text: &str) -> bool {
    text.starts_with('{') && text.ends_with('}')
}

fn parse_record(text: &str) -> std::result::Result<ChatCompletionChunk, StreamRecord> {
    serde_json::from_str::<ChatCompletionChunk>(text).map_err(|err| StreamRecord::Malformed {
        text: text.to_string(),
        error: err.to_string(),
    })
}

fn decode_line(line: &str) -> Option<StreamRecord> {
    match classify_line(line) {
        Line::Json(text) => Some(match parse_record(text) {
            Ok(chunk) => StreamRecord::Chunk(chunk),
            Err(malformed) => malformed,
        }),
        Line::Done | Line::Ignored => None,
    }
}

/// Decode whatever is left in the buffer after the body ends.
///
/// An unterminated `data:` line is decoded like any other line; an unterminated bare object
/// becomes a [`StreamRecord::Trailing`] record.
fn decode_trailing(rest: &str) -> Option<StreamRecord> {
    let trimmed = rest.trim();
    if trimmed.starts_with(DATA_PREFIX) {
        return decode_line(trimmed);
    }
    if !looks_like_object(trimmed) {
        return None;
    }
    Some(match parse_record(trimmed) {
        Ok(chunk) => StreamRecord::Trailing(chunk),
        Err(malformed) => malformed,
    })
}

/// Reassembles newline-terminated lines from arbitrarily split byte chunks.
///
/// Multi-byte UTF-8 sequences split across chunks are held back until complete; invalid
/// sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    text: String,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes, without the trailing newline.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.text[start..].find('\n') {
            let line = &self.text[start..start + pos];
            lines.push(line.strip_suffix('\r').unwrap_or(line).to_string());
            start += pos + 1;
        }
        self.text.drain(..start);
        lines
    }

    /// Text received after the last newline.
    pub fn remainder(&self) -> &str {
        &self.text
    }

    /// Consume the buffer, returning the unterminated remainder.
    pub fn finish(mut self) -> String {
        if !self.pending.is_empty() {
            self.text.push_str(&String::from_utf8_lossy(&self.pending));
        }
        self.text
    }

    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    self.pending.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    self.text
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        Some(invalid) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes.
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }
}

struct RecordState<S> {
    stream: S,
    buffer: Option<LineBuffer>,
    ready: VecDeque<StreamRecord>,
}

/// Process a stream of body chunks into a stream of records.
///
/// Each call to `next` reads at most as many chunks as needed to produce one record.  A
/// transport error is yielded once and ends the stream.  `[DONE]` markers and non-record
/// lines produce nothing.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use chatterbox::sse::{StreamRecord, process_records};
/// use futures::{StreamExt, stream};
///
/// # tokio_test::block_on(async {
/// let body = stream::iter(vec![Ok::<_, chatterbox::Error>(Bytes::from_static(
///     b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\ndata: [DONE]\n",
/// ))]);
/// let records: Vec<_> = process_records(body).collect().await;
/// assert_eq!(records.len(), 1);
/// assert!(matches!(&records[0], Ok(StreamRecord::Chunk(chunk)) if chunk.fragment() == Some("Hi")));
/// # });
/// ```
pub fn process_records<S>(byte_stream: S) -> impl Stream<Item = Result<StreamRecord>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let state = RecordState {
        stream: byte_stream,
        buffer: Some(LineBuffer::new()),
        ready: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(record) = state.ready.pop_front() {
                match &record {
                    StreamRecord::Malformed { .. } => STREAM_MALFORMED_RECORDS.click(),
                    _ => STREAM_RECORDS.click(),
                }
                return Some((Ok(record), state));
            }

            let buffer = state.buffer.as_mut()?;
            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    for line in buffer.push(&bytes) {
                        state.ready.extend(decode_line(&line));
                    }
                }
                Some(Err(err)) => {
                    state.buffer = None;
                    return Some((Err(err), state));
                }
                None => {
                    let rest = state.buffer.take().map(LineBuffer::finish);
                    state
                        .ready
                        .extend(rest.as_deref().and_then(decode_trailing));
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|part| Ok(Bytes::from_static(part.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(parts: &[&'static str]) -> Vec<StreamRecord> {
        let records = process_records(chunks(parts));
        futures::pin_mut!(records);
        let mut out = Vec::new();
        while let Some(record) = records.next().await {
            out.push(record.unwrap());
        }
        out
    }

    fn fragments(records: &[StreamRecord]) -> Vec<String> {
        records
            .iter()
            .filter_map(|record| match record {
                StreamRecord::Chunk(chunk) | StreamRecord::Trailing(chunk) => {
                    chunk.fragment().map(str::to_string)
                }
                StreamRecord::Malformed { .. } => None,
            })
            .collect()
    }

    #[test]
    fn classify() {
        assert_eq!(classify_line("data: [DONE]"), Line::Done);
        assert_eq!(classify_line("data:{\"a\":1}"), Line::Json("{\"a\":1}"));
        assert_eq!(classify_line("  {\"a\":1}  "), Line::Json("{\"a\":1}"));
        assert_eq!(classify_line(""), Line::Ignored);
        assert_eq!(classify_line("data:"), Line::Ignored);
        assert_eq!(classify_line("event: ping"), Line::Ignored);
        assert_eq!(classify_line(": keep-alive"), Line::Ignored);
    }

    #[test]
    fn line_buffer_reassembles() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        assert_eq!(buffer.remainder(), "data: {\"a\"");
        assert_eq!(buffer.push(b":1}\r\nnext"), vec!["data: {\"a\":1}".to_string()]);
        assert_eq!(buffer.finish(), "next");
    }

    #[test]
    fn line_buffer_many_lines_in_one_chunk() {
        let body: String = (0..1000).map(|n| format!("line {n}\r\n")).collect();
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(format!("{body}\n\ntail").as_bytes());
        assert_eq!(lines.len(), 1002);
        assert_eq!(lines[0], "line 0");
        assert_eq!(lines[999], "line 999");
        assert_eq!(lines[1000], "");
        assert_eq!(lines[1001], "");
        assert_eq!(buffer.remainder(), "tail");
    }

    #[test]
    fn line_buffer_split_utf8() {
        let snowman = "☃".as_bytes();
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(&snowman[..1]).is_empty());
        assert_eq!(buffer.remainder(), "");
        assert_eq!(buffer.push(&[&snowman[1..], &b"\n"[..]].concat()), vec!["☃"]);
    }

    #[test]
    fn line_buffer_invalid_utf8() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"a\xffb\n"), vec!["a\u{fffd}b"]);
    }

    #[tokio::test]
    async fn event_stream_records() {
        let records = collect(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: [DONE]\n",
        ])
        .await;
        assert_eq!(fragments(&records), vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn record_split_across_reads() {
        let records = collect(&[
            "data: {\"choices\":[{\"del",
            "ta\":{\"content\":\"Hi\"}}]}\n\n",
        ])
        .await;
        assert_eq!(fragments(&records), vec!["Hi"]);
    }

    #[tokio::test]
    async fn bare_json_lines() {
        let records = collect(&[
            "{\"choices\":[{\"message\":{\"content\":\"a\"}}]}\n{\"choices\":[{\"message\":{\"content\":\"b\"}}]}\n",
        ])
        .await;
        assert_eq!(fragments(&records), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn malformed_record_is_reported_not_fatal() {
        let records = collect(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
        ])
        .await;
        assert!(matches!(records[0], StreamRecord::Malformed { .. }));
        assert_eq!(fragments(&records), vec!["b"]);
    }

    #[tokio::test]
    async fn trailing_object_without_newline() {
        let records = collect(&[
            "{\"choices\":[{\"message\":{\"content\":\"Hi\"}}],",
            "\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":1,\"total_tokens\":6}}",
        ])
        .await;
        assert_eq!(records.len(), 1);
        let StreamRecord::Trailing(chunk) = &records[0] else {
            panic!("expected trailing record, got {records:?}");
        };
        assert_eq!(chunk.fragment(), Some("Hi"));
        assert_eq!(chunk.usage.map(|u| u.total_tokens), Some(6));
    }

    #[tokio::test]
    async fn trailing_garbage_is_malformed() {
        let records = collect(&["{not json}"]).await;
        assert!(matches!(records.as_slice(), [StreamRecord::Malformed { .. }]));
        assert!(collect(&["partial text"]).await.is_empty());
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            )),
            Err(Error::streaming("connection reset", None)),
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
            )),
        ]);
        let records = process_records(body);
        futures::pin_mut!(records);
        assert!(matches!(
            records.next().await,
            Some(Ok(StreamRecord::Chunk(_)))
        ));
        assert!(matches!(records.next().await, Some(Err(Error::Streaming { .. }))));
        assert!(records.next().await.is_none());
    }
}
