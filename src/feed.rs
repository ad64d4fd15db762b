//! Feed rendering contract.
//!
//! The engine never paints anything itself. It drives a [`FeedSurface`] in a
//! fixed order: the backlog first, oldest to newest, with a date divider
//! wherever the calendar day changes, then live messages appended at the end.
//! [`FeedWriter`] owns that ordering; surfaces only draw what they are told.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::identity::MessageIdentity;
use crate::reactions::EmojiCounts;
use crate::Message;

/// A message ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    /// The message with its timestamp filled in.
    pub message: Message,
    pub identity: MessageIdentity,
    /// `MM-DD-YYYY HH:MM`, or the raw timestamp when it cannot be parsed.
    pub time_label: String,
    pub reactions: EmojiCounts,
}

/// Display surface for one channel feed.
pub trait FeedSurface {
    /// Remove everything from the feed.
    fn clear(&mut self);
    /// Replace the feed with a loading indicator.
    fn show_loading(&mut self);
    /// Replace the feed with an informational placeholder.
    fn show_placeholder(&mut self, text: &str);
    /// Replace the feed with an inline error.
    fn show_error(&mut self, text: &str);
    /// Drop the placeholder, if one is showing, keeping any messages.
    fn remove_placeholder(&mut self);
    fn append_divider(&mut self, label: &str);
    /// Append a message. `notify` is set for live arrivals (chime).
    fn append_message(&mut self, message: &RenderedMessage, notify: bool);
    /// Enable or disable message composition.
    fn set_composer_enabled(&mut self, enabled: bool);
    /// Reactions for an already rendered message changed.
    fn update_reactions(&mut self, _identity: &MessageIdentity, _reactions: &EmojiCounts) {}
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Parse an ISO-8601 instant. Inputs without an offset are taken as UTC.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Render an epoch-millisecond instant the way the stream does: RFC 3339,
/// millisecond precision, `Z` suffix.
pub fn iso_timestamp(epoch_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `MM-DD-YYYY HH:MM` in `tz`; unparsable input comes back unchanged.
pub fn format_timestamp_in<Tz: TimeZone>(ts: &str, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    if ts.is_empty() {
        return String::new();
    }
    match parse_timestamp(ts) {
        Some(dt) => dt.with_timezone(tz).format("%m-%d-%Y %H:%M").to_string(),
        None => ts.to_string(),
    }
}

/// [`format_timestamp_in`] using the local time zone.
pub fn format_timestamp(ts: &str) -> String {
    format_timestamp_in(ts, &Local)
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Appends messages to a surface in order, inserting day dividers.
#[derive(Debug, Clone)]
pub struct FeedWriter<Tz: TimeZone = Local> {
    tz: Tz,
    last_day: Option<NaiveDate>,
    rendered: usize,
}

impl FeedWriter<Local> {
    pub fn local() -> Self {
        FeedWriter::new(Local)
    }
}

impl<Tz: TimeZone> FeedWriter<Tz>
where
    Tz::Offset: std::fmt::Display,
{
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            last_day: None,
            rendered: 0,
        }
    }

    /// Forget the previous day, e.g. after the surface was cleared.
    pub fn reset(&mut self) {
        self.last_day = None;
        self.rendered = 0;
    }

    /// Number of messages written since the last reset.
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    /// Prepare `message` for display. A missing timestamp is replaced by
    /// `now_ms`, which also feeds the identity.
    pub fn prepare(&self, mut message: Message, now_ms: u64, reactions: impl FnOnce(&MessageIdentity) -> EmojiCounts) -> RenderedMessage {
        if message.timestamp.as_deref().map_or(true, str::is_empty) {
            message.timestamp = Some(iso_timestamp(now_ms));
        }
        let identity = message.identity();
        let time_label = format_timestamp_in(message.timestamp.as_deref().unwrap_or(""), &self.tz);
        let reactions = reactions(&identity);
        RenderedMessage {
            message,
            identity,
            time_label,
            reactions,
        }
    }

    /// Append `rendered`, preceded by a divider when its calendar day differs
    /// from the previous message's. The first message never gets a divider.
    pub fn write<S: FeedSurface + ?Sized>(&mut self, surface: &mut S, rendered: &RenderedMessage, notify: bool) {
        let day = rendered
            .message
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .map(|dt| dt.with_timezone(&self.tz).date_naive());

        if let (Some(prev), Some(day)) = (self.last_day, day) {
            if prev != day {
                surface.append_divider(&rendered.time_label);
            }
        }
        // An unparsable timestamp is neither compared nor remembered, so the
        // next parsable message is measured against the last known day.
        if day.is_some() {
            self.last_day = day;
        }
        surface.append_message(rendered, notify);
        self.rendered += 1;
    }
}

// ---------------------------------------------------------------------------
// Recording surface
// ---------------------------------------------------------------------------

/// One thing drawn on a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Loading,
    Placeholder(String),
    Error(String),
    Divider(String),
    Message { rendered: RenderedMessage, notify: bool },
}

/// A surface that keeps what it is told in a `Vec`.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    pub items: Vec<FeedItem>,
    pub composer_enabled: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<&Message> {
        self.items
            .iter()
            .filter_map(|item| match item {
                FeedItem::Message { rendered, .. } => Some(&rendered.message),
                _ => None,
            })
            .collect()
    }

    pub fn contents(&self) -> Vec<&str> {
        self.messages().into_iter().map(|m| m.content.as_str()).collect()
    }

    pub fn dividers(&self) -> usize {
        self.items.iter().filter(|i| matches!(i, FeedItem::Divider(_))).count()
    }

    pub fn notifications(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, FeedItem::Message { notify: true, .. }))
            .count()
    }

    pub fn error(&self) -> Option<&str> {
        self.items.iter().find_map(|i| match i {
            FeedItem::Error(e) => Some(e.as_str()),
            _ => None,
        })
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.items.iter().find_map(|i| match i {
            FeedItem::Placeholder(p) => Some(p.as_str()),
            _ => None,
        })
    }

    pub fn is_loading(&self) -> bool {
        self.items.iter().any(|i| matches!(i, FeedItem::Loading))
    }
}

impl FeedSurface for RecordingSurface {
    fn clear(&mut self) {
        self.items.clear();
    }

    fn show_loading(&mut self) {
        self.items = vec![FeedItem::Loading];
    }

    fn show_placeholder(&mut self, text: &str) {
        self.items = vec![FeedItem::Placeholder(text.to_string())];
    }

    fn show_error(&mut self, text: &str) {
        self.items = vec![FeedItem::Error(text.to_string())];
    }

    fn remove_placeholder(&mut self) {
        self.items.retain(|i| !matches!(i, FeedItem::Placeholder(_)));
    }

    fn append_divider(&mut self, label: &str) {
        self.items.push(FeedItem::Divider(label.to_string()));
    }

    fn append_message(&mut self, message: &RenderedMessage, notify: bool) {
        self.items.push(FeedItem::Message {
            rendered: message.clone(),
            notify,
        });
    }

    fn set_composer_enabled(&mut self, enabled: bool) {
        self.composer_enabled = enabled;
    }

    fn update_reactions(&mut self, identity: &MessageIdentity, reactions: &EmojiCounts) {
        for item in &mut self.items {
            if let FeedItem::Message { rendered, .. } = item {
                if &rendered.identity == identity {
                    rendered.reactions = reactions.clone();
                }
            }
        }
    }
}
