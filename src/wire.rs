use serde::{Deserialize, Serialize};

use crate::Message;

// -- GET /api/history ---------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<Message>,
}

// -- GET /api/history/stream --------------------------------------------------

/// Event type tag of an actionable stream payload.
pub const MESSAGE_EVENT: &str = "message";

/// One `data:` payload on the live stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type", default, deserialize_with = "crate::null_as_empty")]
    pub event_type: String,
    #[serde(default, deserialize_with = "crate::null_as_empty")]
    pub role: String,
    #[serde(default, deserialize_with = "crate::null_as_empty")]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl StreamEvent {
    /// Only `message` events with a role or some content are rendered.
    pub fn is_actionable(&self) -> bool {
        self.event_type == MESSAGE_EVENT && (!self.role.is_empty() || !self.content.is_empty())
    }

    pub fn into_message(self) -> Message {
        Message {
            role: self.role,
            content: self.content,
            timestamp: self.timestamp.filter(|t| !t.is_empty()),
        }
    }
}

// -- POST /api/history/human --------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HumanMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct HumanMessageResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub message: Option<Message>,
}
