//! Event stream decoding.
//!
//! Streamed responses are framed incrementally, either as server-sent
//! events or as newline-delimited json, and every event goes through the
//! same selection and conversion as a complete response body.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use indexmap::IndexMap;
use serde_json::Value;

use crate::deserialize::convert;
use crate::error::{Error, Result};
use crate::select::Selector;
use crate::shape::ResponseType;
use crate::value::Decoded;

const TEXT_EVENT_STREAM: &str = "text/event-stream";
const NDJSON: &str = "application/x-ndjson";

/// Framing of a streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFormat {
    /// `text/event-stream`: blank-line separated `field: value` frames.
    Sse,
    /// `application/x-ndjson`: one json document per line.
    Ndjson,
}

impl EventFormat {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let content_type = content_type.trim().to_ascii_lowercase();
        if content_type.starts_with(TEXT_EVENT_STREAM) {
            Some(EventFormat::Sse)
        } else if content_type.starts_with(NDJSON) {
            Some(EventFormat::Ndjson)
        } else {
            None
        }
    }
}

// ============================================================================
// Framing
// ============================================================================

/// Longest line accepted in an event stream.
pub const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// Splits a byte stream into lines ending in `\n` or `\r\n`.
#[derive(Debug)]
struct LineBuffer {
    buf: Vec<u8>,
    /// Bytes of `buf` known to hold no newline.
    scanned: usize,
    max_line: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    fn with_limit(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_line,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = self.buf.len();
            if self.scanned > self.max_line {
                return Err(Error::Stream(format!(
                    "event stream line exceeds {} bytes",
                    self.max_line
                )));
            }
            return Ok(None);
        };
        let end = self.scanned + offset;
        self.scanned = 0;
        let mut line: Vec<u8> = self.buf.drain(..=end).collect();
        line.pop();
        Ok(Some(decode_line(line)))
    }

    /// The unterminated remainder, at end of stream.
    fn take_rest(&mut self) -> Option<String> {
        self.scanned = 0;
        if self.buf.is_empty() {
            return None;
        }
        Some(decode_line(std::mem::take(&mut self.buf)))
    }
}

fn decode_line(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8_lossy(&line).into_owned()
}

/// Accumulates the fields of one server-sent event.
#[derive(Debug, Default)]
struct SseFrame {
    fields: IndexMap<String, String>,
}

impl SseFrame {
    /// Feed one line; returns the frame when the line completes it.
    fn line(&mut self, line: &str) -> Option<Value> {
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
        match self.fields.get_mut(field) {
            Some(data) if field == "data" => {
                data.push('\n');
                data.push_str(value);
            }
            Some(existing) => *existing = value.to_string(),
            None => {
                self.fields.insert(field.to_string(), value.to_string());
            }
        }
        None
    }

    /// Emit the accumulated fields, each value parsed as json if possible.
    fn dispatch(&mut self) -> Option<Value> {
        if self.fields.is_empty() {
            return None;
        }
        let fields = std::mem::take(&mut self.fields);
        Some(Value::Object(
            fields
                .into_iter()
                .map(|(field, value)| (field, parse_lenient(value)))
                .collect(),
        ))
    }
}

fn parse_lenient(value: String) -> Value {
    serde_json::from_str(&value).unwrap_or(Value::String(value))
}

#[derive(Debug)]
struct EventDecoder {
    format: EventFormat,
    lines: LineBuffer,
    frame: SseFrame,
}

impl EventDecoder {
    fn new(format: EventFormat) -> Self {
        Self {
            format,
            lines: LineBuffer::default(),
            frame: SseFrame::default(),
        }
    }

    fn push(&mut self, chunk: &[u8], out: &mut VecDeque<Value>) -> Result<()> {
        self.lines.push(chunk);
        while let Some(line) = self.lines.next_line()? {
            self.line(&line, out);
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut VecDeque<Value>) {
        if let Some(line) = self.lines.take_rest() {
            self.line(&line, out);
        }
        if let Some(event) = self.frame.dispatch() {
            out.push_back(event);
        }
    }

    fn line(&mut self, line: &str, out: &mut VecDeque<Value>) {
        match self.format {
            EventFormat::Sse => out.extend(self.frame.line(line)),
            EventFormat::Ndjson => {
                if line.trim().is_empty() {
                    return;
                }
                match serde_json::from_str(line) {
                    Ok(event) => out.push_back(event),
                    Err(e) => {
                        tracing::warn!(error = %e, line = %line, "Cannot deserialize event");
                    }
                }
            }
        }
    }
}

/// Whether a frame only carries a reconnection delay.
fn is_retry_only(event: &Value) -> bool {
    event
        .as_object()
        .is_some_and(|fields| fields.len() == 1 && fields.contains_key("retry"))
}

// ============================================================================
// EventStream
// ============================================================================

/// A single-pass stream of decoded events.
///
/// Each event is converted into the shape resolved from the response
/// status. Dropping the stream, or calling [`EventStream::close`], releases
/// the underlying response.
pub struct EventStream {
    body: Option<BoxStream<'static, Result<Bytes>>>,
    decoder: EventDecoder,
    pending: VecDeque<Value>,
    shape: ResponseType,
    selector: Option<Selector>,
}

impl EventStream {
    pub(crate) fn new(
        response: reqwest::Response,
        format: EventFormat,
        shape: ResponseType,
        selector: Option<Selector>,
    ) -> Self {
        let body = response.bytes_stream().map(|chunk| chunk.map_err(Error::from)).boxed();
        Self::from_body(body, format, shape, selector)
    }

    pub(crate) fn from_body(
        body: BoxStream<'static, Result<Bytes>>,
        format: EventFormat,
        shape: ResponseType,
        selector: Option<Selector>,
    ) -> Self {
        Self {
            body: Some(body),
            decoder: EventDecoder::new(format),
            pending: VecDeque::new(),
            shape,
            selector,
        }
    }

    /// Fail the stream when a read of the body waits longer than `timeout`.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.body = self.body.take().map(|body| with_read_timeout(body, timeout));
        self
    }

    pub fn format(&self) -> EventFormat {
        self.decoder.format
    }

    /// The shape every event is converted into.
    pub fn shape(&self) -> &ResponseType {
        &self.shape
    }

    /// Release the response; no further events are produced.
    pub fn close(&mut self) {
        self.body = None;
        self.pending.clear();
    }

    fn decode(&self, event: Value) -> Result<Decoded> {
        match &self.selector {
            Some(selector) => convert(&selector.select(&event), &self.shape),
            None => convert(&event, &self.shape),
        }
    }

    fn next_pending(&mut self) -> Option<Value> {
        while let Some(event) = self.pending.pop_front() {
            if !is_retry_only(&event) {
                return Some(event);
            }
        }
        None
    }
}

fn with_read_timeout(
    body: BoxStream<'static, Result<Bytes>>,
    timeout: Duration,
) -> BoxStream<'static, Result<Bytes>> {
    futures::stream::unfold(Some(body), move |state| async move {
        let mut body = state?;
        match tokio::time::timeout(timeout, body.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
            Ok(Some(Err(e))) => Some((Err(e), None)),
            Ok(None) => None,
            Err(_) => Some((
                Err(Error::Stream(format!("no data received for {:?}", timeout))),
                None,
            )),
        }
    })
    .boxed()
}

impl Stream for EventStream {
    type Item = Result<Decoded>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.next_pending() {
                return Poll::Ready(Some(this.decode(event)));
            }
            let Some(body) = this.body.as_mut() else {
                return Poll::Ready(None);
            };
            match ready!(body.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    if let Err(e) = this.decoder.push(&chunk, &mut this.pending) {
                        this.body = None;
                        this.pending.clear();
                        return Poll::Ready(Some(Err(e)));
                    }
                }
                Some(Err(e)) => {
                    this.body = None;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.body = None;
                    this.decoder.finish(&mut this.pending);
                }
            }
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if self.body.is_some() {
            tracing::debug!("Event stream dropped before its end, closing response");
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("format", &self.decoder.format)
            .field("shape", &self.shape.to_string())
            .field("selector", &self.selector)
            .field("open", &self.body.is_some())
            .finish()
    }
}
