//! Backlog fetch for one channel.

use std::time::Duration;

use tracing::debug;

use crate::channels::Channel;
use crate::error::NetworkError;
use crate::wire::HistoryResponse;
use crate::Message;

/// Loads `GET /api/history?channel={id}`.
#[derive(Debug, Clone)]
pub struct HistoryLoader {
    base_url: String,
    client: reqwest::Client,
}

impl HistoryLoader {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Loader with its own client and a connect timeout. The request itself
    /// is bounded only by the transport.
    pub fn with_defaults(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self::new(base_url, client)
    }

    pub fn url_for(&self, channel: Channel) -> String {
        format!("{}/api/history?channel={}", self.base_url, channel.id())
    }

    /// Fetch the channel's backlog, oldest first.
    ///
    /// # Errors
    /// - [`NetworkError::Connect`] when no response arrives.
    /// - [`NetworkError::Http`] on a non-2xx status.
    /// - [`NetworkError::Body`] when the body is not `{ "messages": [...] }`.
    pub async fn load_history(&self, channel: Channel) -> Result<Vec<Message>, NetworkError> {
        let url = self.url_for(channel);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NetworkError::Connect {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(NetworkError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| NetworkError::Body {
            url: url.clone(),
            detail: e.to_string(),
        })?;

        let history: HistoryResponse =
            serde_json::from_slice(&bytes).map_err(|e| NetworkError::Body {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        debug!(channel = %channel, count = history.messages.len(), "history loaded");
        Ok(history.messages)
    }
}
