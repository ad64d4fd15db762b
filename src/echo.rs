//! Self-echo suppression for the authored channel.
//!
//! A message the user sends is rendered locally at once, and the server
//! later broadcasts it back on the live stream. The reconciler remembers the
//! last send and swallows the first matching echo that arrives inside the
//! window. This is a heuristic: a late echo is rendered as a duplicate, and a
//! second send before the first echo replaces the pending record.
//!
//! The comparison uses wall-clock milliseconds from a [`Clock`], so a clock
//! adjustment between send and echo can widen or shrink the effective window.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::channels::Channel;
use crate::Message;

/// Default suppression window.
pub const DEFAULT_ECHO_WINDOW: Duration = Duration::from_millis(3000);

/// Role the server assigns to messages posted from this client.
pub const DEFAULT_AUTHOR_ROLE: &str = "Human";

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" in Unix epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// The last locally sent message still waiting for its echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSelfEcho {
    pub content: String,
    pub sent_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EchoState {
    #[default]
    Idle,
    AwaitingEcho(PendingSelfEcho),
}

#[derive(Debug, Clone)]
pub struct SelfEchoReconciler {
    state: EchoState,
    window: Duration,
    author_role: String,
}

impl Default for SelfEchoReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_WINDOW, DEFAULT_AUTHOR_ROLE)
    }
}

impl SelfEchoReconciler {
    pub fn new(window: Duration, author_role: impl Into<String>) -> Self {
        Self {
            state: EchoState::Idle,
            window,
            author_role: author_role.into(),
        }
    }

    pub fn state(&self) -> &EchoState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingSelfEcho> {
        match &self.state {
            EchoState::AwaitingEcho(p) => Some(p),
            EchoState::Idle => None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn author_role(&self) -> &str {
        &self.author_role
    }

    /// Remember a send. Replaces any record still pending.
    pub fn record_send(&mut self, content: &str, now_ms: u64) {
        if let Some(prev) = self.pending() {
            debug!(previous = %prev.content, "pending echo overwritten by a newer send");
        }
        self.state = EchoState::AwaitingEcho(PendingSelfEcho {
            content: content.to_string(),
            sent_at_ms: now_ms,
        });
    }

    /// Decide whether a live `message` on `channel` is the echo of the
    /// pending send. A match clears the record and returns `true`.
    pub fn should_suppress(&mut self, channel: Channel, message: &Message, now_ms: u64) -> bool {
        if !channel.is_authored() || message.role != self.author_role {
            return false;
        }
        let EchoState::AwaitingEcho(pending) = &self.state else {
            return false;
        };
        let elapsed = now_ms.saturating_sub(pending.sent_at_ms);
        if u128::from(elapsed) >= self.window.as_millis() {
            debug!(elapsed_ms = elapsed, "pending echo expired");
            self.state = EchoState::Idle;
            return false;
        }
        if message.content != pending.content {
            return false;
        }
        self.state = EchoState::Idle;
        true
    }

    /// Drop any pending record.
    pub fn reset(&mut self) {
        self.state = EchoState::Idle;
    }
}
