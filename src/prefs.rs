use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::PersistenceError;

pub const PREFS_FILE: &str = "chat-prefs.json";

/// Client preferences that survive restarts. Never sent to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Chime on live messages. Off until the user turns it on.
    #[serde(default)]
    pub sound_enabled: bool,
}

/// Preferences bound to a file.
#[derive(Debug, Clone)]
pub struct PreferenceFile {
    path: PathBuf,
    prefs: Preferences,
}

impl PreferenceFile {
    /// Load from `<state_dir>/chat-prefs.json`; missing or corrupt files give
    /// the defaults.
    pub fn load(state_dir: &Path) -> Self {
        let path = state_dir.join(PREFS_FILE);
        let prefs = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self { path, prefs }
    }

    pub fn get(&self) -> Preferences {
        self.prefs
    }

    pub fn sound_enabled(&self) -> bool {
        self.prefs.sound_enabled
    }

    /// Update the flag and persist. A failed write is logged and the new
    /// value still applies for this session.
    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.prefs.sound_enabled = enabled;
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to persist preferences");
        }
    }

    fn save(&self) -> Result<(), PersistenceError> {
        let io_err = |source| PersistenceError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&self.path, serde_json::to_vec(&self.prefs)?).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sound_defaults_off() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!PreferenceFile::load(dir.path()).sound_enabled());
    }

    #[test]
    fn sound_flag_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = PreferenceFile::load(dir.path());
        p.set_sound_enabled(true);
        assert!(PreferenceFile::load(dir.path()).sound_enabled());
        p.set_sound_enabled(false);
        assert!(!PreferenceFile::load(dir.path()).sound_enabled());
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PREFS_FILE), "true").unwrap();
        assert_eq!(PreferenceFile::load(dir.path()).get(), Preferences::default());
    }
}
