//! Error types for the synchronization engine.
//!
//! Each failure class maps to one surfacing rule: network errors become an
//! inline per-channel message, stream and parse errors close or skip
//! silently, persistence and send errors are logged and swallowed. Nothing
//! here is fatal to the client.

use thiserror::Error;

/// Failure to obtain a channel's backlog.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request never produced a response.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },
    /// The server replied with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    /// The body was not the expected JSON shape.
    #[error("malformed response from {url}: {detail}")]
    Body { url: String, detail: String },
}

/// Failure to read or write client-local state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// Transport failure on the live stream.
    #[error("live stream for '{channel}' failed: {detail}")]
    Stream { channel: String, detail: String },
    /// A single stream payload that could not be decoded.
    #[error("unparsable stream event: {0}")]
    Parse(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// The human message POST did not succeed.
    #[error("send failed: {0}")]
    Send(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
