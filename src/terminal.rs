//! Colored terminal rendering of a channel feed.
//!
//! Printed lines cannot be taken back, so "replace the feed" operations
//! print a channel banner and start numbering from 1 again. Messages are
//! numbered so `/react <n>` can address them.

use colored::*;
use std::io::{self, Stdout, Write};

use crate::channels::Channel;
use crate::feed::{FeedSurface, RenderedMessage};
use crate::identity::MessageIdentity;
use crate::reactions::{format_reactions, EmojiCounts};
use crate::recommendations::RecommendationResponse;

const BELL: &str = "\x07";
const CONTINUATION_INDENT: &str = "    ";

/// Make server-supplied text safe to print.
///
/// Control characters are written out as escapes so a message cannot move
/// the cursor, clear the screen or ring the bell. Line breaks survive, but
/// each continuation line is indented so it can never pass for a numbered
/// message.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                out.push('\n');
                out.push_str(CONTINUATION_INDENT);
            }
            '\t' => out.push(c),
            c if c.is_control() => out.extend(c.escape_default()),
            c => out.push(c),
        }
    }
    out
}

pub struct TerminalSurface<W: Write = Stdout> {
    out: W,
    /// Identities in display order; index 0 is message `[1]`.
    numbered: Vec<MessageIdentity>,
    sound: bool,
    composer_enabled: bool,
}

impl TerminalSurface<Stdout> {
    pub fn stdout(sound: bool) -> Self {
        Self::new(io::stdout(), sound)
    }
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, sound: bool) -> Self {
        Self {
            out,
            numbered: Vec::new(),
            sound,
            composer_enabled: false,
        }
    }

    pub fn set_sound(&mut self, enabled: bool) {
        self.sound = enabled;
    }

    pub fn composer_enabled(&self) -> bool {
        self.composer_enabled
    }

    /// Identity of message `[index]` (1-based).
    pub fn identity_at(&self, index: usize) -> Option<&MessageIdentity> {
        index.checked_sub(1).and_then(|i| self.numbered.get(i))
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn banner(&mut self, channel: Channel) {
        let _ = writeln!(self.out);
        let _ = writeln!(
            self.out,
            "{} {}",
            "#".bright_blue(),
            channel.label().bright_cyan().bold()
        );
        let _ = writeln!(self.out, "{}", "=".repeat(50).bright_blue());
        let _ = self.out.flush();
    }

    pub fn notice(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text.bright_yellow());
        let _ = self.out.flush();
    }

    pub fn print_help(&mut self, help: &str) {
        let _ = writeln!(self.out, "{}", help.bright_white());
    }

    pub fn print_channels(&mut self, active: Option<Channel>) {
        for channel in Channel::ALL {
            let marker = if Some(channel) == active { "*" } else { " " };
            let mut line = format!("{marker} {:<18} {}", channel.id(), channel.label());
            if !channel.is_historied() {
                line.push_str("  (no history)");
            }
            if Some(channel) == active {
                let _ = writeln!(self.out, "{}", line.bright_green());
            } else {
                let _ = writeln!(self.out, "{line}");
            }
        }
        let _ = self.out.flush();
    }

    pub fn print_recommendations(&mut self, profile: &str, resp: &RecommendationResponse) {
        let _ = writeln!(
            self.out,
            "{}: {}",
            "Recommendations for".bright_yellow(),
            profile.bright_white()
        );
        if let Some(err) = &resp.error {
            let _ = writeln!(self.out, "{} {}", "Error:".bright_red(), sanitize(err));
        }
        if resp.recommendations.is_empty() && resp.error.is_none() {
            let _ = writeln!(self.out, "  no recommendations");
        }
        for rec in &resp.recommendations {
            let likelihood = rec
                .likelihood_percent()
                .map(|p| format!("{p}%"))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                self.out,
                "  {} {}",
                sanitize(&rec.user).bright_cyan().bold(),
                likelihood.bright_green()
            );
            let aspects = rec.common_aspects.joined();
            if !aspects.is_empty() {
                let _ = writeln!(self.out, "    in common: {}", sanitize(&aspects));
            }
            if !rec.what_you_can_learn_from_them.is_empty() {
                let _ = writeln!(self.out, "    you learn: {}", sanitize(&rec.what_you_can_learn_from_them));
            }
            if !rec.what_they_can_learn_from_you.is_empty() {
                let _ = writeln!(self.out, "    they learn: {}", sanitize(&rec.what_they_can_learn_from_you));
            }
        }
        let _ = self.out.flush();
    }

    fn reset_numbering(&mut self) {
        self.numbered.clear();
    }
}

impl<W: Write> FeedSurface for TerminalSurface<W> {
    fn clear(&mut self) {
        self.reset_numbering();
    }

    fn show_loading(&mut self) {
        self.reset_numbering();
        let _ = writeln!(self.out, "{}", "Loading…".bright_black());
        let _ = self.out.flush();
    }

    fn show_placeholder(&mut self, text: &str) {
        self.reset_numbering();
        let _ = writeln!(self.out, "{}", sanitize(text).bright_black().italic());
        let _ = self.out.flush();
    }

    fn show_error(&mut self, text: &str) {
        self.reset_numbering();
        let _ = writeln!(self.out, "{}", sanitize(text).bright_red());
        let _ = self.out.flush();
    }

    fn remove_placeholder(&mut self) {}

    fn append_divider(&mut self, label: &str) {
        let _ = writeln!(self.out, "{}", format!("──── {} ────", sanitize(label)).bright_blue());
    }

    fn append_message(&mut self, rendered: &RenderedMessage, notify: bool) {
        self.numbered.push(rendered.identity.clone());
        let n = self.numbered.len();
        let mut line = format!(
            "{} {} {}: {}",
            format!("[{n}]").bright_black(),
            rendered.time_label.bright_black(),
            sanitize(&rendered.message.role).bright_yellow().bold(),
            sanitize(&rendered.message.content)
        );
        let reactions = format_reactions(&rendered.reactions);
        if !reactions.is_empty() {
            line.push_str("  ");
            line.push_str(&reactions);
        }
        let _ = writeln!(self.out, "{line}");
        if notify && self.sound {
            let _ = write!(self.out, "{BELL}");
        }
        let _ = self.out.flush();
    }

    fn set_composer_enabled(&mut self, enabled: bool) {
        self.composer_enabled = enabled;
    }

    fn update_reactions(&mut self, identity: &MessageIdentity, reactions: &EmojiCounts) {
        let Some(pos) = self.numbered.iter().position(|id| id == identity) else {
            return;
        };
        let _ = writeln!(
            self.out,
            "  {} [{}] {}",
            "↳".bright_black(),
            pos + 1,
            format_reactions(reactions)
        );
        let _ = self.out.flush();
    }
}
