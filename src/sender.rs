//! Posting human-authored messages.
//!
//! The client renders a sent message before the POST resolves and never
//! rolls it back, so a failed send leaves the local view showing something
//! the server never stored. Failures are only logged.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::wire::{HumanMessageRequest, HumanMessageResponse};

#[derive(Debug, Clone)]
pub struct HumanSender {
    base_url: String,
    client: reqwest::Client,
}

impl HumanSender {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn with_defaults(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self::new(base_url, client)
    }

    pub fn url(&self) -> String {
        format!("{}/api/history/human", self.base_url)
    }

    /// POST `{content}` and wait for `{ok: true}`.
    ///
    /// # Errors
    /// [`SyncError::Send`] on connection failure, an unparsable reply or
    /// `ok: false`.
    pub async fn send(&self, content: &str) -> Result<(), SyncError> {
        let url = self.url();
        let resp = self
            .client
            .post(&url)
            .json(&HumanMessageRequest {
                content: content.to_string(),
            })
            .send()
            .await
            .map_err(|e| SyncError::Send(format!("POST {url}: {e}")))?;

        let status = resp.status();
        let body: HumanMessageResponse = resp
            .json()
            .await
            .map_err(|e| SyncError::Send(format!("HTTP {status}, unreadable reply: {e}")))?;

        if body.ok {
            debug!("human message accepted");
            Ok(())
        } else {
            Err(SyncError::Send(
                body.error.unwrap_or_else(|| format!("HTTP {status}")),
            ))
        }
    }

    /// Fire-and-forget [`send`](Self::send); failures are logged.
    pub fn spawn_send(&self, content: String) -> JoinHandle<()> {
        let sender = self.clone();
        tokio::spawn(async move {
            if let Err(e) = sender.send(&content).await {
                warn!(error = %e, "human message not delivered; local copy kept");
            }
        })
    }
}
