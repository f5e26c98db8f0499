//! Durable Storage
//!
//! A small key/value abstraction standing in for browser local storage, with
//! an in-memory and a directory-backed implementation, plus the
//! persona-scoped [`StateStore`] that reads and writes the conversation blob.

use crate::{
    state::{ConversationState, SessionSummary},
    transcript::{Transcript, TranscriptEntry},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Marker written by the login flow; its absence means a fresh login.
pub const SESSION_MARKER_KEY: &str = "user_session_active";
pub const USER_NAME_KEY: &str = "user_name";
pub const USER_EMAIL_KEY: &str = "user_email";

/// Key families purged on a fresh login, appended to each persona prefix.
const STALE_FAMILIES: [&str; 3] = ["_session_", "_summary_", "_paused_"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("stored record could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
    #[error("storage lock poisoned")]
    Poisoned,
}

/// String key/value storage shared by the session and the login flows.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens the store, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// The blob written under a persona's active-session key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(flatten)]
    pub state: ConversationState,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub chat_history: Vec<TranscriptEntry>,
}

/// Persona-scoped view of the key/value store.
#[derive(Clone)]
pub struct StateStore {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl StateStore {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn active_key(&self) -> String {
        format!("{}_session_active", self.prefix)
    }

    pub fn summary_key(&self, session_id: &str) -> String {
        format!("{}_summary_{}", self.prefix, session_id)
    }

    /// Writes the full state plus the derived transcript under the active key.
    pub fn persist(
        &self,
        state: &ConversationState,
        transcript: &Transcript,
    ) -> Result<(), StoreError> {
        let record = PersistedSession {
            state: state.clone(),
            timestamp: Utc::now(),
            chat_history: transcript.history(),
        };
        let text = serde_json::to_string(&record)?;
        self.store.set(&self.active_key(), &text)?;
        debug!(key = %self.active_key(), completed = state.completed().len(), "Session persisted");
        Ok(())
    }

    /// Reads the active record. A record that no longer parses is treated as
    /// absent.
    pub fn load(&self) -> Result<Option<PersistedSession>, StoreError> {
        let Some(text) = self.store.get(&self.active_key())? else {
            return Ok(None);
        };
        match serde_json::from_str(&text) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(key = %self.active_key(), error = %e, "Ignoring unreadable saved session");
                Ok(None)
            }
        }
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(&self.active_key())?;
        debug!(key = %self.active_key(), "Session cleared from storage");
        Ok(())
    }

    pub fn save_summary(&self, summary: &SessionSummary) -> Result<String, StoreError> {
        let key = self.summary_key(&summary.session_id);
        self.store.set(&key, &serde_json::to_string(summary)?)?;
        Ok(key)
    }

    pub fn load_summary(&self, session_id: &str) -> Result<Option<SessionSummary>, StoreError> {
        match self.store.get(&self.summary_key(session_id))? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }
}

/// Removes every session, summary and paused record under `prefixes` when
/// the login marker is absent. Returns the number of keys removed.
pub fn purge_stale_sessions(
    store: &dyn KeyValueStore,
    prefixes: &[&str],
) -> Result<usize, StoreError> {
    if store.get(SESSION_MARKER_KEY)?.is_some() {
        debug!("Login marker present; keeping saved sessions");
        return Ok(0);
    }

    let stale: Vec<String> = store
        .keys()?
        .into_iter()
        .filter(|key| {
            prefixes.iter().any(|prefix| {
                STALE_FAMILIES
                    .iter()
                    .any(|family| key.starts_with(&format!("{}{}", prefix, family)))
            })
        })
        .collect();
    for key in &stale {
        store.remove(key)?;
    }
    info!(removed = stale.len(), "Cleared old sessions for fresh login");
    Ok(stale.len())
}

/// Records a logged-in user, as the external login flow would.
pub fn mark_user_session(
    store: &dyn KeyValueStore,
    name: Option<&str>,
    email: Option<&str>,
) -> Result<(), StoreError> {
    store.set(SESSION_MARKER_KEY, "true")?;
    if let Some(name) = name {
        store.set(USER_NAME_KEY, name)?;
    }
    if let Some(email) = email {
        store.set(USER_EMAIL_KEY, email)?;
    }
    Ok(())
}

pub fn clear_user_markers(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    for key in [SESSION_MARKER_KEY, USER_NAME_KEY, USER_EMAIL_KEY] {
        store.remove(key)?;
    }
    Ok(())
}
