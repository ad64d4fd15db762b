//! Scripted HTTP backend for integration tests: a raw tokio listener that
//! serves history, the SSE stream, human posts and recommendations.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// What the server sends on `/api/history/stream` for one channel.
#[derive(Debug, Clone, Default)]
pub struct StreamScript {
    /// Written one after another, flushed individually.
    pub chunks: Vec<String>,
    /// Keep the connection open after the last chunk.
    pub hold_open: bool,
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub histories: HashMap<String, Reply>,
    pub streams: HashMap<String, StreamScript>,
    pub human: Option<Reply>,
    pub recommendations: Option<Reply>,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: String,
}

pub struct MockServer {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<Request>>>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(script);

        let log = requests.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let script = script.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, &script, &log).await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            task,
        }
    }

    pub fn requests_to(&self, path_prefix: &str) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path.starts_with(path_prefix))
            .cloned()
            .collect()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A port with nothing listening on it.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn sse(payload: &str) -> String {
    format!("data: {payload}\n\n")
}

pub fn message_event(role: &str, content: &str, timestamp: &str) -> String {
    sse(&serde_json::json!({
        "type": "message",
        "role": role,
        "content": content,
        "timestamp": timestamp,
    })
    .to_string())
}

pub fn history_body(messages: &[(&str, &str, &str)]) -> String {
    let messages: Vec<_> = messages
        .iter()
        .map(|(role, content, ts)| serde_json::json!({"role": role, "content": content, "timestamp": ts}))
        .collect();
    serde_json::json!({ "messages": messages }).to_string()
}

fn query_param<'a>(path: &'a str, key: &str) -> Option<&'a str> {
    let (_, query) = path.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

async fn read_request(stream: &mut TcpStream) -> io::Result<Option<Request>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);

        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut req = httparse::Request::new(&mut headers);
        match req.parse(&buf) {
            Ok(httparse::Status::Complete(head_len)) => {
                let content_length = req
                    .headers
                    .iter()
                    .find(|h| h.name.eq_ignore_ascii_case("content-length"))
                    .and_then(|h| std::str::from_utf8(h.value).ok())
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let method = req.method.unwrap_or("").to_string();
                let path = req.path.unwrap_or("").to_string();

                let mut body = buf[head_len..].to_vec();
                while body.len() < content_length {
                    let n = stream.read(&mut chunk).await?;
                    if n == 0 {
                        break;
                    }
                    body.extend_from_slice(&chunk[..n]);
                }
                return Ok(Some(Request {
                    method,
                    path,
                    body: String::from_utf8_lossy(&body).into_owned(),
                }));
            }
            Ok(httparse::Status::Partial) => continue,
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }
}

async fn write_reply(stream: &mut TcpStream, reply: &Reply) -> io::Result<()> {
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    let response = format!(
        "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reply.body.len(),
        reply.body,
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await
}

async fn handle_connection(
    mut stream: TcpStream,
    script: &Script,
    log: &Mutex<Vec<Request>>,
) -> io::Result<()> {
    let Some(request) = read_request(&mut stream).await? else {
        return Ok(());
    };
    log.lock().unwrap().push(request.clone());

    let path = request.path.split('?').next().unwrap_or("");
    let channel = query_param(&request.path, "channel").unwrap_or("");
    let not_found = Reply::json(404, r#"{"error":"not found"}"#);

    match (request.method.as_str(), path) {
        ("GET", "/api/history") => {
            let reply = script.histories.get(channel).unwrap_or(&not_found);
            write_reply(&mut stream, reply).await
        }
        ("GET", "/api/history/stream") => {
            let Some(plan) = script.streams.get(channel) else {
                return write_reply(&mut stream, &not_found).await;
            };
            if let Some(status) = plan.status {
                return write_reply(&mut stream, &Reply::json(status, "{}")).await;
            }
            stream
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
                )
                .await?;
            for chunk in &plan.chunks {
                stream.write_all(chunk.as_bytes()).await?;
                stream.flush().await?;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            if plan.hold_open {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(())
        }
        ("POST", "/api/history/human") => {
            let reply = script
                .human
                .clone()
                .unwrap_or_else(|| Reply::json(200, r#"{"ok":true}"#));
            write_reply(&mut stream, &reply).await
        }
        ("POST", "/api/recommendations") => {
            let reply = script.recommendations.as_ref().unwrap_or(&not_found);
            write_reply(&mut stream, reply).await
        }
        _ => write_reply(&mut stream, &not_found).await,
    }
}
