//! Channel switch controller.
//!
//! [`SessionContext`] is the single owner of the mutable client state: the
//! active channel, the open [`StreamHandle`], the pending self-echo and the
//! reaction overlay. Switching channels closes the stream, clears the
//! pending echo and bumps a generation counter; a backlog that completes
//! under an older generation is discarded instead of being rendered into
//! the wrong channel.
//!
//! A switch is split into [`begin_switch`](SessionContext::begin_switch) and
//! [`complete_switch`](SessionContext::complete_switch) so callers can run the
//! history fetch concurrently with other input. [`switch_channel`](SessionContext::switch_channel)
//! does both in one call.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::channels::Channel;
use crate::echo::{Clock, PendingSelfEcho, SelfEchoReconciler, SystemClock, DEFAULT_AUTHOR_ROLE, DEFAULT_ECHO_WINDOW};
use crate::error::NetworkError;
use crate::feed::{iso_timestamp, FeedSurface, FeedWriter};
use crate::history::HistoryLoader;
use crate::identity::MessageIdentity;
use crate::reactions::{EmojiCounts, MemoryBackend, ReactionStore};
use crate::sender::HumanSender;
use crate::stream::{StreamHandle, StreamSubscriber};
use crate::Message;

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// A backlog fetch that owns its inputs, so it can be spawned while the
/// session keeps handling input.
pub type HistoryFuture = Pin<Box<dyn Future<Output = Result<Vec<Message>, NetworkError>> + Send + 'static>>;

/// Everything the session needs from the server.
pub trait ChannelBackend {
    /// Fetch a channel's backlog.
    fn load_history(&self, channel: Channel) -> HistoryFuture;

    /// Open the live stream for `channel`.
    fn subscribe(&self, channel: Channel) -> StreamHandle;

    /// Post a human-authored message without waiting for the result.
    fn post_human(&self, content: String);
}

/// The HTTP backend: history, live stream and human posts against one origin.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    history: HistoryLoader,
    stream: StreamSubscriber,
    sender: HumanSender,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            history: HistoryLoader::with_defaults(base_url),
            stream: StreamSubscriber::with_defaults(base_url),
            sender: HumanSender::with_defaults(base_url),
        }
    }
}

impl ChannelBackend for HttpBackend {
    fn load_history(&self, channel: Channel) -> HistoryFuture {
        let loader = self.history.clone();
        Box::pin(async move { loader.load_history(channel).await })
    }

    fn subscribe(&self, channel: Channel) -> StreamHandle {
        self.stream.subscribe(channel)
    }

    fn post_human(&self, content: String) {
        // Detached; the task logs its own failure.
        let _ = self.sender.spawn_send(content);
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Proof that a switch was started, checked when its backlog arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchTicket {
    generation: u64,
    channel: Channel,
}

impl SwitchTicket {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
pub enum SwitchOutcome {
    /// Ephemeral channel: placeholder shown, no stream.
    Placeholder,
    /// Backlog rendered and live stream opened.
    Live { backlog: usize },
    /// Backlog fetch failed; inline error shown, no stream.
    Failed(NetworkError),
    /// The user switched again before the backlog arrived; nothing rendered.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    Rendered,
    /// Recognised as the echo of our own send.
    Suppressed,
}

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

pub struct SessionContext<B: ChannelBackend = HttpBackend, C: Clock = SystemClock> {
    backend: B,
    clock: C,
    active: Option<Channel>,
    generation: u64,
    stream: Option<StreamHandle>,
    echo: SelfEchoReconciler,
    reactions: ReactionStore,
    writer: FeedWriter,
    showing_placeholder: bool,
}

impl<B: ChannelBackend> SessionContext<B, SystemClock> {
    pub fn builder(backend: B) -> SessionBuilder<B, SystemClock> {
        SessionBuilder {
            backend,
            clock: SystemClock,
            reactions: None,
            echo_window: DEFAULT_ECHO_WINDOW,
            author_role: DEFAULT_AUTHOR_ROLE.to_string(),
        }
    }
}

impl<B: ChannelBackend, C: Clock> SessionContext<B, C> {
    pub fn active_channel(&self) -> Option<Channel> {
        self.active
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Message composition is only allowed on the authored channel.
    pub fn composer_enabled(&self) -> bool {
        self.active.is_some_and(Channel::is_authored)
    }

    pub fn pending_echo(&self) -> Option<&PendingSelfEcho> {
        self.echo.pending()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Tear down the current channel and start showing `channel`.
    ///
    /// Returns a ticket when a backlog must be fetched, `None` for an
    /// ephemeral channel (its placeholder is already shown).
    pub fn begin_switch<S: FeedSurface + ?Sized>(&mut self, channel: Channel, surface: &mut S) -> Option<SwitchTicket> {
        self.teardown();
        self.generation += 1;
        self.active = Some(channel);
        self.writer.reset();
        surface.set_composer_enabled(channel.is_authored());

        info!(channel = %channel, generation = self.generation, "switching channel");

        if !channel.is_historied() {
            surface.show_placeholder(channel.empty_text());
            self.showing_placeholder = true;
            return None;
        }

        surface.show_loading();
        self.showing_placeholder = false;
        Some(SwitchTicket {
            generation: self.generation,
            channel,
        })
    }

    /// Backlog request for `ticket`, independent of `self`.
    pub fn history_request(&self, ticket: SwitchTicket) -> HistoryFuture {
        self.backend.load_history(ticket.channel)
    }

    /// Apply a backlog result. Stale tickets are ignored.
    pub fn complete_switch<S: FeedSurface + ?Sized>(
        &mut self,
        ticket: SwitchTicket,
        result: Result<Vec<Message>, NetworkError>,
        surface: &mut S,
    ) -> SwitchOutcome {
        if ticket.generation != self.generation || self.active != Some(ticket.channel) {
            debug!(
                channel = %ticket.channel,
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale backlog"
            );
            return SwitchOutcome::Stale;
        }

        let messages = match result {
            Ok(messages) => messages,
            Err(e) => {
                warn!(channel = %ticket.channel, error = %e, "history fetch failed");
                surface.show_error(&format!("Error: {e}"));
                return SwitchOutcome::Failed(e);
            }
        };

        surface.clear();
        let backlog = messages.len();
        if messages.is_empty() {
            surface.show_placeholder(ticket.channel.empty_text());
            self.showing_placeholder = true;
        } else {
            let now = self.clock.now_ms();
            for message in messages {
                self.render(message, now, false, surface);
            }
        }

        self.stream = Some(self.backend.subscribe(ticket.channel));
        SwitchOutcome::Live { backlog }
    }

    /// Switch to `channel` and wait for its backlog.
    pub async fn switch_channel<S: FeedSurface + ?Sized>(&mut self, channel: Channel, surface: &mut S) -> SwitchOutcome {
        let Some(ticket) = self.begin_switch(channel, surface) else {
            return SwitchOutcome::Placeholder;
        };
        let result = self.history_request(ticket).await;
        self.complete_switch(ticket, result, surface)
    }

    /// Wait for the next live message. `None` when no stream is open or the
    /// open one just ended, in which case it is released. Cancel-safe.
    pub async fn next_live_message(&mut self) -> Option<Message> {
        let handle = self.stream.as_mut()?;
        match handle.next_event().await {
            Some(message) => Some(message),
            None => {
                info!(channel = ?self.active, "live stream closed; reselect the channel to reconnect");
                self.stream = None;
                None
            }
        }
    }

    /// Run one live message through echo suppression and render survivors.
    pub fn apply_live<S: FeedSurface + ?Sized>(&mut self, message: Message, surface: &mut S) -> LiveOutcome {
        let now = self.clock.now_ms();
        let Some(channel) = self.active else {
            return LiveOutcome::Suppressed;
        };
        if self.echo.should_suppress(channel, &message, now) {
            debug!(channel = %channel, "suppressed self-echo");
            return LiveOutcome::Suppressed;
        }
        self.render(message, now, true, surface);
        LiveOutcome::Rendered
    }

    /// [`next_live_message`](Self::next_live_message) then
    /// [`apply_live`](Self::apply_live). `None` once the stream is gone.
    pub async fn next_live<S: FeedSurface + ?Sized>(&mut self, surface: &mut S) -> Option<LiveOutcome> {
        let message = self.next_live_message().await?;
        Some(self.apply_live(message, surface))
    }

    /// Send `content` on the authored channel: render it locally now,
    /// remember it for echo suppression and post it in the background.
    /// Returns `false` when nothing was sent.
    pub fn send_human<S: FeedSurface + ?Sized>(&mut self, content: &str, surface: &mut S) -> bool {
        if !self.composer_enabled() {
            return false;
        }
        let content = content.trim();
        if content.is_empty() {
            return false;
        }
        let now = self.clock.now_ms();
        self.echo.record_send(content, now);

        let local = Message::new(self.echo.author_role(), content, Some(&iso_timestamp(now)));
        self.render(local, now, false, surface);

        self.backend.post_human(content.to_string());
        true
    }

    pub fn add_reaction<S: FeedSurface + ?Sized>(&mut self, id: &MessageIdentity, emoji: &str, surface: &mut S) {
        self.reactions.add_reaction(id, emoji);
        surface.update_reactions(id, &self.reactions.get_reactions(id));
    }

    pub fn reactions_for(&self, id: &MessageIdentity) -> EmojiCounts {
        self.reactions.get_reactions(id)
    }

    /// Close the stream and forget the pending echo.
    pub fn teardown(&mut self) {
        if let Some(handle) = self.stream.take() {
            handle.close();
        }
        self.echo.reset();
    }

    fn render<S: FeedSurface + ?Sized>(&mut self, message: Message, now_ms: u64, notify: bool, surface: &mut S) {
        if self.showing_placeholder {
            surface.remove_placeholder();
            self.showing_placeholder = false;
        }
        let reactions = &self.reactions;
        let rendered = self.writer.prepare(message, now_ms, |id| reactions.get_reactions(id));
        self.writer.write(surface, &rendered, notify);
    }
}

impl<B: ChannelBackend, C: Clock> std::fmt::Debug for SessionContext<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("active", &self.active)
            .field("generation", &self.generation)
            .field("streaming", &self.stream.is_some())
            .field("echo", self.echo.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`SessionContext`].
pub struct SessionBuilder<B: ChannelBackend, C: Clock> {
    backend: B,
    clock: C,
    reactions: Option<ReactionStore>,
    echo_window: Duration,
    author_role: String,
}

impl<B: ChannelBackend, C: Clock> SessionBuilder<B, C> {
    /// Replace the wall clock.
    pub fn clock<C2: Clock>(self, clock: C2) -> SessionBuilder<B, C2> {
        SessionBuilder {
            backend: self.backend,
            clock,
            reactions: self.reactions,
            echo_window: self.echo_window,
            author_role: self.author_role,
        }
    }

    /// Reaction overlay to use. Defaults to an in-memory one.
    pub fn reactions(mut self, store: ReactionStore) -> Self {
        self.reactions = Some(store);
        self
    }

    /// Override the self-echo window (default 3 s).
    pub fn echo_window(mut self, window: Duration) -> Self {
        self.echo_window = window;
        self
    }

    /// Override the local author role (default `Human`).
    pub fn author_role(mut self, role: impl Into<String>) -> Self {
        self.author_role = role.into();
        self
    }

    pub fn build(self) -> SessionContext<B, C> {
        SessionContext {
            backend: self.backend,
            clock: self.clock,
            active: None,
            generation: 0,
            stream: None,
            echo: SelfEchoReconciler::new(self.echo_window, self.author_role),
            reactions: self
                .reactions
                .unwrap_or_else(|| ReactionStore::load(MemoryBackend::new())),
            writer: FeedWriter::local(),
            showing_placeholder: false,
        }
    }
}
