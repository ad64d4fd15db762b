//! Client-local reaction overlay.
//!
//! Reactions are never sent to the server. The whole overlay is written back
//! through a [`ReactionBackend`] after every mutation; a failed write is
//! logged and otherwise ignored, so the in-memory counts keep working for
//! the rest of the session. Keys are [`MessageIdentity`] values and are not
//! scoped per channel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::identity::MessageIdentity;

/// File name of the persisted overlay inside the state directory.
pub const REACTIONS_FILE: &str = "chat-message-reactions.json";

/// Picker palette offered by the client.
pub const REACTION_EMOJIS: [&str; 9] = ["👍", "❤️", "😂", "😮", "😢", "👏", "🔥", "🎉", "👎"];

/// emoji → count for one message.
pub type EmojiCounts = BTreeMap<String, u32>;

/// identity → emoji → count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactionState(BTreeMap<MessageIdentity, EmojiCounts>);

impl ReactionState {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Durable storage for the overlay.
///
/// `load` returns `None` for missing or unreadable data; callers start from
/// an empty overlay in that case. `save` replaces the stored overlay whole.
pub trait ReactionBackend: Send {
    fn load(&self) -> Option<ReactionState>;
    fn save(&mut self, state: &ReactionState) -> Result<(), PersistenceError>;
}

/// Whole-file JSON storage.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backend at `<state_dir>/chat-message-reactions.json`.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(REACTIONS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReactionBackend for JsonFileBackend {
    fn load(&self) -> Option<ReactionState> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no stored reactions");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "stored reactions unreadable, starting empty");
                None
            }
        }
    }

    fn save(&mut self, state: &ReactionState) -> Result<(), PersistenceError> {
        let io_err = |source| PersistenceError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let body = serde_json::to_vec(state)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

/// In-process storage. Clones share the same slot, which lets a test build a
/// second store over the same data to simulate a reload.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    slot: Arc<Mutex<Option<ReactionState>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> Option<ReactionState> {
        self.slot.lock().ok().and_then(|s| s.clone())
    }
}

impl ReactionBackend for MemoryBackend {
    fn load(&self) -> Option<ReactionState> {
        self.stored()
    }

    fn save(&mut self, state: &ReactionState) -> Result<(), PersistenceError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(state.clone());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// The reaction overlay plus its backend.
pub struct ReactionStore {
    state: ReactionState,
    backend: Box<dyn ReactionBackend>,
}

impl ReactionStore {
    /// Load the overlay once from `backend`.
    pub fn load(backend: impl ReactionBackend + 'static) -> Self {
        let state = backend.load().unwrap_or_default();
        debug!(messages = state.len(), "reaction overlay loaded");
        Self {
            state,
            backend: Box::new(backend),
        }
    }

    /// Increment `emoji` on `id` and persist the whole overlay.
    pub fn add_reaction(&mut self, id: &MessageIdentity, emoji: &str) {
        let count = self
            .state
            .0
            .entry(id.clone())
            .or_default()
            .entry(emoji.to_string())
            .or_insert(0);
        *count = count.saturating_add(1);

        if let Err(e) = self.backend.save(&self.state) {
            warn!(error = %e, message = %id, "failed to persist reactions; keeping in-memory state");
        }
    }

    /// Positive counts recorded for `id`; empty when none.
    pub fn get_reactions(&self, id: &MessageIdentity) -> EmojiCounts {
        self.state
            .0
            .get(id)
            .map(|m| m.iter().filter(|&(_, &n)| n > 0).map(|(e, &n)| (e.clone(), n)).collect())
            .unwrap_or_default()
    }

    pub fn state(&self) -> &ReactionState {
        &self.state
    }
}

impl std::fmt::Debug for ReactionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactionStore")
            .field("messages", &self.state.len())
            .finish()
    }
}

/// Render counts as `👍 🔥 3`: the bare emoji for one, emoji and count above.
pub fn format_reactions(counts: &EmojiCounts) -> String {
    counts
        .iter()
        .filter(|&(_, &n)| n > 0)
        .map(|(emoji, &n)| if n > 1 { format!("{emoji} {n}") } else { emoji.clone() })
        .collect::<Vec<_>>()
        .join(" ")
}
