//! Channel synchronization engine for multi-channel live chat feeds.
//!
//! A [`session::SessionContext`] owns the active channel. Switching channels
//! tears down the live stream, loads the channel backlog over HTTP, renders
//! it through a [`feed::FeedSurface`], then attaches a server-sent event
//! stream whose events pass through the [`echo::SelfEchoReconciler`] before
//! they are appended. Reactions live in a client-local overlay keyed by a
//! content-derived [`identity::MessageIdentity`].

pub mod channels;
pub mod cli;
pub mod config;
pub mod echo;
pub mod error;
pub mod feed;
pub mod history;
pub mod identity;
pub mod prefs;
pub mod reactions;
pub mod recommendations;
pub mod sender;
pub mod session;
pub mod stream;
pub mod terminal;
pub mod wire;

use serde::{Deserialize, Serialize};

pub use channels::Channel;
pub use error::{NetworkError, PersistenceError, SyncError};
pub use identity::{identity, MessageIdentity};
pub use session::SessionContext;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One chat message as served by the history endpoint and the live stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Persona name, e.g. `Gaurav` or `Human`.
    #[serde(default, alias = "speaker", deserialize_with = "null_as_empty")]
    pub role: String,
    #[serde(default, alias = "text", deserialize_with = "null_as_empty")]
    pub content: String,
    /// ISO-8601 instant. Absent on a freshly authored local message.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>, timestamp: Option<&str>) -> Self {
        Message {
            role: role.into(),
            content: content.into(),
            timestamp: timestamp.map(str::to_string),
        }
    }

    pub fn identity(&self) -> MessageIdentity {
        MessageIdentity::for_message(self)
    }
}

/// Deserialize a string field that the server may send as `null`.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_null_fields_become_empty() {
        let m: Message = serde_json::from_str(r#"{"role":"Anagha","content":null}"#).unwrap();
        assert_eq!(m.role, "Anagha");
        assert_eq!(m.content, "");
        let m: Message = serde_json::from_str(r#"{"speaker":null,"text":"hi"}"#).unwrap();
        assert_eq!(m.role, "");
        assert_eq!(m.content, "hi");
    }

    #[test]
    fn message_missing_fields_default() {
        let m: Message = serde_json::from_str("{}").expect("deser failed");
        assert_eq!(m.role, "");
        assert_eq!(m.content, "");
        assert!(m.timestamp.is_none());
    }

    #[test]
    fn message_null_timestamp() {
        let m: Message = serde_json::from_str(r#"{"role":"A","content":"b","timestamp":null}"#).unwrap();
        assert!(m.timestamp.is_none());
    }

    #[test]
    fn message_identity_is_stable() {
        let m = Message::new("Human", "hello", None);
        assert_eq!(m.identity(), m.clone().identity());
    }
}
