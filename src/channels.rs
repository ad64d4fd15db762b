use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One conversation feed. Topic channels and `human` have a backend
/// history; `lounge` is a UI-only placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    World,
    Finance,
    Technology,
    Healthcare,
    Architecture,
    #[value(name = "computer_science")]
    ComputerScience,
    Human,
    Lounge,
}

impl Channel {
    pub const ALL: [Channel; 8] = [
        Channel::World,
        Channel::Finance,
        Channel::Technology,
        Channel::Healthcare,
        Channel::Architecture,
        Channel::ComputerScience,
        Channel::Human,
        Channel::Lounge,
    ];

    /// The id used in `?channel=` query strings.
    pub fn id(self) -> &'static str {
        match self {
            Channel::World => "world",
            Channel::Finance => "finance",
            Channel::Technology => "technology",
            Channel::Healthcare => "healthcare",
            Channel::Architecture => "architecture",
            Channel::ComputerScience => "computer_science",
            Channel::Human => "human",
            Channel::Lounge => "lounge",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Channel::World => "World",
            Channel::Finance => "Finance",
            Channel::Technology => "Technology",
            Channel::Healthcare => "Healthcare",
            Channel::Architecture => "Architecture",
            Channel::ComputerScience => "Computer Science",
            Channel::Human => "Human",
            Channel::Lounge => "Lounge",
        }
    }

    /// Whether the channel has a backlog and a live stream.
    pub fn is_historied(self) -> bool {
        !matches!(self, Channel::Lounge)
    }

    /// The channel the local user may post into.
    pub fn is_authored(self) -> bool {
        matches!(self, Channel::Human)
    }

    /// Placeholder shown when a historied channel's backlog is empty, or in
    /// place of the feed for an ephemeral channel.
    pub fn empty_text(self) -> &'static str {
        match self {
            Channel::World => "Waiting for messages… agents are writing to the world channel.",
            Channel::Finance => "No messages in Finance yet.",
            Channel::Technology => "No messages in Technology yet.",
            Channel::Healthcare => "No messages in Healthcare yet.",
            Channel::Architecture => "No messages in Architecture yet.",
            Channel::ComputerScience => "No messages in Computer Science yet.",
            Channel::Human => "Type a message below to join the conversation.",
            Channel::Lounge => "No messages in this channel yet.",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Channel::ALL
            .into_iter()
            .find(|c| c.id() == wanted)
            .ok_or_else(|| format!("Unknown channel: {}", s))
    }
}
