//! Two-scope key-value persistence and the chat session store built on it.
//!
//! The app carries two distinct storage lifetimes: the browsing-session
//! scope (chat transcript, name capture) and the longer-lived app scope
//! (e.g. remembered preferences). Each scope gets its own handle and its
//! own backing namespace; nothing can read across scopes by construction.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{FastbirdError, Result};
use crate::session::{Message, SessionState};

/// Storage lifetime for a [`KvStore`] handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    /// Cleared when the browsing session ends.
    Session,
    /// Survives across sessions (consent choices, preferences).
    App,
}

impl StoreScope {
    fn file_name(&self) -> &'static str {
        match self {
            StoreScope::Session => "session.json",
            StoreScope::App => "app.json",
        }
    }
}

/// String key-value store, one handle per [`StoreScope`].
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store, the session-scoped backing for embedded hosts, where
/// the handle's lifetime is the browsing session.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|map| map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self
            .entries
            .lock()
            .map_err(|_| FastbirdError::Store("store lock poisoned".into()))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut map = self
            .entries
            .lock()
            .map_err(|_| FastbirdError::Store("store lock poisoned".into()))?;
        map.remove(key);
        Ok(())
    }
}

/// File-backed store: one JSON map per scope under the base directory.
pub struct FileKvStore {
    path: PathBuf,
}

impl FileKvStore {
    pub fn new(base: PathBuf, scope: StoreScope) -> Self {
        Self {
            path: base.join(scope.file_name()),
        }
    }

    /// Default store location: `~/.fastbird/store/`
    pub fn default_base() -> PathBuf {
        crate::config::data_dir().join("store")
    }

    async fn read_map(&self) -> HashMap<String, String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %self.path.display(), %e, "Corrupt store file, starting fresh");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        }
    }

    async fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_string_pretty(map)?;
        // Atomic write: write to temp then rename
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.read_map().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map().await;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_map().await;
        if map.remove(key).is_some() {
            self.write_map(&map).await?;
        }
        Ok(())
    }
}

const KEY_MESSAGES: &str = "chat.messages";
const KEY_USER_NAME: &str = "chat.userName";
const KEY_NAME_SET: &str = "chat.nameSet";

/// Session-state persistence over a session-scoped [`KvStore`].
///
/// The three parts (transcript, user name, confirmed flag) live under
/// independent keys, read independently at widget mount and written on
/// every mutation. [`ChatSessionStore::load`] never fails: anything
/// malformed degrades to the default empty state.
pub struct ChatSessionStore {
    kv: Arc<dyn KvStore>,
}

impl ChatSessionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn load(&self) -> SessionState {
        let transcript: Vec<Message> = match self.kv.get(KEY_MESSAGES).await {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(%e, "Corrupt stored transcript, starting a fresh session");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let user_name = self
            .kv
            .get(KEY_USER_NAME)
            .await
            .filter(|name| !name.is_empty());
        let name_confirmed = self.kv.get(KEY_NAME_SET).await.as_deref() == Some("true");

        debug!(
            entries = transcript.len(),
            name_confirmed, "Loaded chat session"
        );
        SessionState::from_parts(transcript, user_name, name_confirmed)
    }

    pub async fn save(&self, state: &SessionState) -> Result<()> {
        let messages = serde_json::to_string(state.transcript())?;
        self.kv.set(KEY_MESSAGES, &messages).await?;
        match state.user_name() {
            Some(name) => self.kv.set(KEY_USER_NAME, name).await?,
            None => self.kv.remove(KEY_USER_NAME).await?,
        }
        self.kv
            .set(KEY_NAME_SET, if state.name_confirmed() { "true" } else { "false" })
            .await?;
        Ok(())
    }
}
