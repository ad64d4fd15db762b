use crate::channels::Channel;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "channel-sync")]
#[command(version)]
#[command(about = "Live terminal client for multi-channel agent conversations")]
pub struct Args {
    /// Backend origin (default http://127.0.0.1:8002)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Channel to open at startup
    #[arg(long, value_enum)]
    pub channel: Option<Channel>,

    /// Directory for reactions and preferences (default .channel-sync)
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Self-echo suppression window in milliseconds (default 3000)
    #[arg(long)]
    pub echo_window_ms: Option<u64>,

    /// Role the server assigns to messages you send (default Human)
    #[arg(long)]
    pub author: Option<String>,

    /// Profile used for /recommend (default Gaurav)
    #[arg(long)]
    pub profile: Option<String>,

    /// TOML config file (default ./channel-sync.toml when present)
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Plain text: send on the authored channel.
    Say(String),
    Switch(Channel),
    /// React to the n-th message (1-based, as numbered on screen).
    React { index: usize, emoji: String },
    Sound(bool),
    Recommend(Option<String>),
    Channels,
    Help,
    Quit,
    /// Blank line.
    Nothing,
    /// A slash command that did not parse.
    Invalid(String),
}

pub const HELP_TEXT: &str = "\
commands:
  /switch <channel>      open another channel (alias /c)
  /channels              list channels
  /react <n> <emoji|k>   react to message n with an emoji or palette entry k (1-9)
  /sound on|off          chime on live messages
  /recommend [profile]   coffee-chat recommendations
  /help                  this text
  /quit                  exit
anything else is sent as a message on the human channel";

/// Parse a prompt line.
pub fn parse_input(line: &str) -> InputCommand {
    let line = line.trim();
    if line.is_empty() {
        return InputCommand::Nothing;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return InputCommand::Say(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    let cmd = parts.next().unwrap_or("").to_lowercase();
    let args: Vec<&str> = parts.collect();

    match (cmd.as_str(), args.as_slice()) {
        ("switch" | "c", [name]) => match name.parse::<Channel>() {
            Ok(channel) => InputCommand::Switch(channel),
            Err(e) => InputCommand::Invalid(e),
        },
        ("react" | "r", [n, emoji]) => match n.parse::<usize>() {
            Ok(index) if index > 0 => InputCommand::React {
                index,
                emoji: resolve_emoji(emoji),
            },
            _ => InputCommand::Invalid(format!("not a message number: {n}")),
        },
        ("sound", ["on"]) => InputCommand::Sound(true),
        ("sound", ["off"]) => InputCommand::Sound(false),
        ("recommend", []) => InputCommand::Recommend(None),
        ("recommend", [user]) => InputCommand::Recommend(Some(user.to_string())),
        ("channels", []) => InputCommand::Channels,
        ("help" | "h" | "?", _) => InputCommand::Help,
        ("quit" | "q" | "exit", _) => InputCommand::Quit,
        _ => InputCommand::Invalid(format!("unknown command: /{rest}")),
    }
}

/// `1`..`9` pick from the reaction palette; anything else is taken as-is.
fn resolve_emoji(token: &str) -> String {
    match token.parse::<usize>() {
        Ok(k) if (1..=crate::reactions::REACTION_EMOJIS.len()).contains(&k) => {
            crate::reactions::REACTION_EMOJIS[k - 1].to_string()
        }
        _ => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::parse_from(["channel-sync"]);
        assert!(args.base_url.is_none());
        assert!(args.channel.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn test_args_parse_full() {
        let args = Args::parse_from([
            "channel-sync",
            "--base-url",
            "http://10.0.0.2:8002",
            "--channel",
            "computer_science",
            "--state-dir",
            "/tmp/s",
            "--echo-window-ms",
            "1200",
            "--author",
            "Me",
            "--profile",
            "Nirbhay",
            "-c",
            "x.toml",
        ]);
        assert_eq!(args.base_url.as_deref(), Some("http://10.0.0.2:8002"));
        assert_eq!(args.channel, Some(Channel::ComputerScience));
        assert_eq!(args.state_dir, Some(PathBuf::from("/tmp/s")));
        assert_eq!(args.echo_window_ms, Some(1200));
        assert_eq!(args.author.as_deref(), Some("Me"));
        assert_eq!(args.profile.as_deref(), Some("Nirbhay"));
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn test_args_reject_unknown_channel() {
        assert!(Args::try_parse_from(["channel-sync", "--channel", "sports"]).is_err());
    }

    #[rstest]
    #[case("hello there", InputCommand::Say("hello there".into()))]
    #[case("   ", InputCommand::Nothing)]
    #[case("/switch finance", InputCommand::Switch(Channel::Finance))]
    #[case("/c human", InputCommand::Switch(Channel::Human))]
    #[case("/react 2 🔥", InputCommand::React { index: 2, emoji: "🔥".into() })]
    #[case("/r 1 1", InputCommand::React { index: 1, emoji: "👍".into() })]
    #[case("/react 3 9", InputCommand::React { index: 3, emoji: "👎".into() })]
    #[case("/sound on", InputCommand::Sound(true))]
    #[case("/sound off", InputCommand::Sound(false))]
    #[case("/recommend", InputCommand::Recommend(None))]
    #[case("/recommend Anagha", InputCommand::Recommend(Some("Anagha".into())))]
    #[case("/channels", InputCommand::Channels)]
    #[case("/help", InputCommand::Help)]
    #[case("/QUIT", InputCommand::Quit)]
    fn test_parse_input(#[case] line: &str, #[case] expected: InputCommand) {
        assert_eq!(parse_input(line), expected);
    }

    #[rstest]
    #[case("/switch")]
    #[case("/switch sports")]
    #[case("/react 0 🔥")]
    #[case("/react x 🔥")]
    #[case("/sound loud")]
    #[case("/dance")]
    fn test_parse_input_invalid(#[case] line: &str) {
        assert!(matches!(parse_input(line), InputCommand::Invalid(_)));
    }

    #[test]
    fn test_palette_index_out_of_range_is_literal() {
        assert_eq!(resolve_emoji("10"), "10");
    }
}
