//! Live stream subscription.
//!
//! `GET /api/history/stream?channel={id}` is a server-sent event stream whose
//! `data:` payloads are JSON `{type, role, content, timestamp}`. A spawned
//! reader task parses it and forwards actionable messages over an mpsc
//! channel to the [`StreamHandle`]. A payload that fails to parse is dropped
//! without touching the stream. A transport error ends the task and the
//! handle reports closed; nothing reconnects.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::channels::Channel;
use crate::error::SyncError;
use crate::wire::StreamEvent;
use crate::Message;

// ---------------------------------------------------------------------------
// SSE framing
// ---------------------------------------------------------------------------

/// Longest line the parser will buffer while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental `text/event-stream` decoder.
///
/// Bytes are buffered until a full line is available, so chunk boundaries
/// may fall anywhere, including inside a multi-byte character. `data` lines
/// accumulate until a blank line dispatches the event; comments and other
/// fields are ignored. A line longer than the cap is dropped whole, along
/// with the event it belonged to.
#[derive(Debug)]
pub struct SseParser {
    buf: Vec<u8>,
    data: Vec<String>,
    max_line: usize,
    /// Skipping the rest of an oversized line.
    discarding: bool,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            data: Vec::new(),
            max_line,
            discarding: false,
        }
    }

    /// Feed one chunk, returning the data payloads it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if raw.len() - 1 > self.max_line {
                self.drop_oversized_line();
                continue;
            }
            let decoded = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = decoded.strip_suffix('\r').unwrap_or(&decoded);

            if line.is_empty() {
                if !self.data.is_empty() {
                    out.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.find(':') {
                Some(i) => (&line[..i], &line[i + 1..]),
                None => (line, ""),
            };
            if field == "data" {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }

        if self.buf.len() > self.max_line {
            self.buf.clear();
            if !self.discarding {
                self.discarding = true;
                self.drop_oversized_line();
            }
        } else if self.discarding {
            self.buf.clear();
        }
        out
    }

    fn drop_oversized_line(&mut self) {
        debug!(limit = self.max_line, "dropping oversized event line");
        self.data.clear();
    }
}

/// Decode one payload into a renderable message. `Ok(None)` for events that
/// are valid but not actionable.
pub fn decode_event(payload: &str) -> Result<Option<Message>, SyncError> {
    let event: StreamEvent =
        serde_json::from_str(payload).map_err(|e| SyncError::Parse(e.to_string()))?;
    Ok(event.is_actionable().then(|| event.into_message()))
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// An open live stream for one channel.
///
/// Dropping or [`close`](Self::close)-ing the handle stops the reader task;
/// events still buffered are discarded with it.
#[derive(Debug)]
pub struct StreamHandle {
    channel: Channel,
    rx: mpsc::UnboundedReceiver<Message>,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Run `reader` on a new task, giving it the sending half.
    pub fn spawn<F, Fut>(channel: Channel, reader: F) -> Self
    where
        F: FnOnce(mpsc::UnboundedSender<Message>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(reader(tx));
        Self {
            channel,
            rx,
            task: Some(task),
        }
    }

    /// A handle fed by the caller instead of a reader task.
    pub fn detached(channel: Channel) -> (Self, mpsc::UnboundedSender<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                channel,
                rx,
                task: None,
            },
            tx,
        )
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Next live message, or `None` once the stream has ended.
    pub async fn next_event(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`next_event`](Self::next_event).
    pub fn try_next_event(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Stop the reader. Nothing is delivered after this returns.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(channel = %self.channel, "live stream closed");
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// Opens live streams against a backend.
#[derive(Debug, Clone)]
pub struct StreamSubscriber {
    base_url: String,
    client: reqwest::Client,
}

impl StreamSubscriber {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Subscriber with its own client. No overall request timeout, the
    /// stream is expected to stay open indefinitely.
    pub fn with_defaults(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self::new(base_url, client)
    }

    pub fn url_for(&self, channel: Channel) -> String {
        format!("{}/api/history/stream?channel={}", self.base_url, channel.id())
    }

    /// Open the live stream for `channel`. Must be called inside a Tokio
    /// runtime. Connection failures surface as an immediately closed handle.
    pub fn subscribe(&self, channel: Channel) -> StreamHandle {
        let client = self.client.clone();
        let url = self.url_for(channel);
        StreamHandle::spawn(channel, move |tx| read_stream(client, url, channel, tx))
    }
}

async fn read_stream(
    client: reqwest::Client,
    url: String,
    channel: Channel,
    tx: mpsc::UnboundedSender<Message>,
) {
    let resp = match client
        .get(&url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            let err = SyncError::Stream {
                channel: channel.to_string(),
                detail: e.to_string(),
            };
            warn!(error = %err, "live stream connect failed, not retrying");
            return;
        }
    };

    if !resp.status().is_success() {
        warn!(
            channel = %channel,
            status = resp.status().as_u16(),
            "live stream rejected, not retrying"
        );
        return;
    }

    info!(channel = %channel, "live stream open");

    let mut body = resp.bytes_stream();
    let mut parser = SseParser::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let err = SyncError::Stream {
                    channel: channel.to_string(),
                    detail: e.to_string(),
                };
                warn!(error = %err, "live stream failed, closing");
                return;
            }
        };

        for payload in parser.feed(&chunk) {
            match decode_event(&payload) {
                Ok(Some(message)) => {
                    if tx.send(message).is_err() {
                        // Handle dropped.
                        return;
                    }
                }
                Ok(None) => debug!(channel = %channel, "ignoring non-message event"),
                Err(e) => debug!(channel = %channel, error = %e, "dropping unparsable event"),
            }
        }
    }

    info!(channel = %channel, "live stream ended by server");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_event() {
        let mut p = SseParser::new();
        let out = p.feed(b"data: {\"a\":1}\n\n");
        assert_eq!(out, vec!["{\"a\":1}"]);
    }

    #[test]
    fn waits_for_blank_line() {
        let mut p = SseParser::new();
        assert!(p.feed(b"data: x\n").is_empty());
        assert_eq!(p.feed(b"\n"), vec!["x"]);
    }

    #[test]
    fn handles_split_chunks_and_crlf() {
        let mut p = SseParser::new();
        assert!(p.feed(b"da").is_empty());
        assert!(p.feed(b"ta: hel").is_empty());
        assert!(p.feed(b"lo\r\n").is_empty());
        assert_eq!(p.feed(b"\r\n"), vec!["hello"]);
    }

    #[test]
    fn multibyte_char_split_across_chunks() {
        let mut p = SseParser::new();
        let bytes = "data: 🔥\n\n".as_bytes();
        let (a, b) = bytes.split_at(8); // inside the 4-byte emoji
        assert!(p.feed(a).is_empty());
        assert_eq!(p.feed(b), vec!["🔥"]);
    }

    #[test]
    fn joins_multi_line_data() {
        let mut p = SseParser::new();
        assert_eq!(p.feed(b"data: a\ndata: b\n\n"), vec!["a\nb"]);
    }

    #[test]
    fn ignores_comments_and_other_fields() {
        let mut p = SseParser::new();
        let out = p.feed(b": keepalive\n\nevent: message\nid: 7\nretry: 10\ndata:x\n\n");
        assert_eq!(out, vec!["x"]);
    }

    #[test]
    fn several_events_in_one_chunk() {
        let mut p = SseParser::new();
        let out = p.feed(b"data: 1\n\ndata: 2\n\ndata: 3\n\n");
        assert_eq!(out, vec!["1", "2", "3"]);
    }

    #[test]
    fn oversized_line_without_newline_is_not_buffered() {
        let mut p = SseParser::with_max_line(16);
        assert!(p.feed(b"data: ").is_empty());
        for _ in 0..1000 {
            assert!(p.feed(b"xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx").is_empty());
            assert!(p.buf.len() <= 16);
        }
        // The tail of the long line is skipped and parsing resumes after it.
        assert!(p.feed(b"xxxx\n\n").is_empty());
        assert_eq!(p.feed(b"data: ok\n\n"), vec!["ok"]);
    }

    #[test]
    fn oversized_line_drops_its_whole_event() {
        let mut p = SseParser::with_max_line(16);
        let out = p.feed(b"data: a\ndata: 0123456789abcdefXYZ\ndata: b\n\ndata: next\n\n");
        assert_eq!(out, vec!["b", "next"]);
    }

    #[test]
    fn line_at_the_cap_is_kept() {
        let mut p = SseParser::with_max_line(8);
        assert_eq!(p.feed(b"data: ab\n\n"), vec!["ab"]);
    }

    #[test]
    fn decode_event_message() {
        let m = decode_event(r#"{"type":"message","role":"Kanishkha","content":"yo","timestamp":"2024-01-01T10:00:00Z"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(m.role, "Kanishkha");
    }

    #[test]
    fn decode_event_null_role_still_renders() {
        let m = decode_event(r#"{"type":"message","role":null,"content":"hello","timestamp":"2024-01-01T10:00:00Z"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(m.role, "");
        assert_eq!(m.content, "hello");
    }

    #[test]
    fn decode_event_non_message_is_none() {
        assert!(decode_event(r#"{"type":"heartbeat"}"#).unwrap().is_none());
    }

    #[test]
    fn decode_event_invalid_json_is_parse_error() {
        assert!(matches!(decode_event("{oops"), Err(SyncError::Parse(_))));
    }

    #[tokio::test]
    async fn detached_handle_delivers_in_order() {
        let (mut h, tx) = StreamHandle::detached(Channel::World);
        tx.send(Message::new("A", "1", None)).unwrap();
        tx.send(Message::new("A", "2", None)).unwrap();
        drop(tx);
        assert_eq!(h.next_event().await.unwrap().content, "1");
        assert_eq!(h.next_event().await.unwrap().content, "2");
        assert!(h.next_event().await.is_none());
    }

    #[tokio::test]
    async fn spawned_reader_stops_when_handle_closed() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let h = StreamHandle::spawn(Channel::World, move |tx| async move {
            let _guard = DropSignal(Some(done_tx));
            loop {
                if tx.send(Message::new("A", "tick", None)).is_err() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });
        h.close();
        tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .expect("reader task should be torn down")
            .ok();
    }

    struct DropSignal(Option<tokio::sync::oneshot::Sender<()>>);

    impl Drop for DropSignal {
        fn drop(&mut self) {
            if let Some(tx) = self.0.take() {
                let _ = tx.send(());
            }
        }
    }

    #[test]
    fn subscriber_url() {
        let s = StreamSubscriber::with_defaults("http://h:1");
        assert_eq!(s.url_for(Channel::Human), "http://h:1/api/history/stream?channel=human");
    }
}
