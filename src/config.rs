//! Client configuration: defaults, an optional TOML file, then CLI flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::channels::Channel;
use crate::cli::Args;
use crate::echo::{DEFAULT_AUTHOR_ROLE, DEFAULT_ECHO_WINDOW};
use crate::error::SyncError;

/// Config file picked up from the working directory when `--config` is not
/// given.
pub const DEFAULT_CONFIG_FILE: &str = "channel-sync.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Backend origin, e.g. `http://127.0.0.1:8002`.
    pub base_url: String,
    /// Channel opened at startup.
    pub channel: Channel,
    /// Where reactions and preferences are kept.
    pub state_dir: PathBuf,
    /// Self-echo suppression window.
    pub echo_window_ms: u64,
    /// Role the server gives to messages sent from this client.
    pub author_role: String,
    /// Profile used for recommendations.
    pub profile: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8002".to_string(),
            channel: Channel::World,
            state_dir: PathBuf::from(".channel-sync"),
            echo_window_ms: DEFAULT_ECHO_WINDOW.as_millis() as u64,
            author_role: DEFAULT_AUTHOR_ROLE.to_string(),
            profile: "Gaurav".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, SyncError> {
        toml::from_str(raw).map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, SyncError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Build the effective configuration for `args`.
    ///
    /// An explicit `--config` must exist; the default file is optional.
    pub fn resolve(args: &Args) -> Result<Self, SyncError> {
        let base = match &args.config {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        let config = base.merge_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Overlay the flags that were given on the command line.
    pub fn merge_args(mut self, args: &Args) -> Self {
        if let Some(url) = &args.base_url {
            self.base_url = url.clone();
        }
        if let Some(channel) = args.channel {
            self.channel = channel;
        }
        if let Some(dir) = &args.state_dir {
            self.state_dir = dir.clone();
        }
        if let Some(ms) = args.echo_window_ms {
            self.echo_window_ms = ms;
        }
        if let Some(author) = &args.author {
            self.author_role = author.clone();
        }
        if let Some(profile) = &args.profile {
            self.profile = profile.clone();
        }
        self
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(SyncError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.author_role.trim().is_empty() {
            return Err(SyncError::Config("author_role must not be empty".into()));
        }
        Ok(())
    }

    pub fn echo_window(&self) -> Duration {
        Duration::from_millis(self.echo_window_ms)
    }
}
