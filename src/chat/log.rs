//! Conversation log with write-through persistence

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::Message;
use crate::{Error, Result};

/// Storage key the conversation log is persisted under
pub const HISTORY_KEY: &str = "cozmoChatHistory";

/// Key/value storage for serialized state
pub trait HistoryStore: Send + Sync {
    /// Read the raw value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be read
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be written
    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be written
    fn remove(&self, key: &str) -> Result<()>;
}

/// Stores each key as a JSON file inside a directory
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    /// Create a store rooted at `dir` (created on first write)
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl HistoryStore for FileHistoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        // Atomic replace via a sibling temp file
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Process-local store, used in tests and for throwaway sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryHistoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Ordered, append-mostly message log
///
/// Every mutation is written through to the attached store. Persistence
/// failures are logged and never interrupt the conversation.
pub struct ConversationLog {
    messages: Vec<Message>,
    store: Option<Arc<dyn HistoryStore>>,
}

impl std::fmt::Debug for ConversationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationLog")
            .field("messages", &self.messages.len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLog {
    /// Create an empty, unpersisted log
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
            store: None,
        }
    }

    /// Load the log from `store`, persisting future mutations to it
    ///
    /// A missing key yields an empty log; unreadable or corrupt data is
    /// logged and replaced by an empty log.
    #[must_use]
    pub fn load(store: Arc<dyn HistoryStore>) -> Self {
        let messages = match store.load(HISTORY_KEY) {
            Ok(Some(raw)) => match decode(&raw) {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding corrupt conversation history");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read conversation history");
                Vec::new()
            }
        };

        tracing::debug!(count = messages.len(), "conversation history loaded");
        Self {
            messages,
            store: Some(store),
        }
    }

    /// All messages in order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent message
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.persist();
    }

    /// Fill in the image of a placeholder message
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no message has the given id
    pub fn fill_image(&mut self, id: &str, image_url: impl Into<String>) -> Result<()> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::NotFound(format!("message {id}")))?;
        message.image_url = Some(image_url.into());
        self.persist();
        Ok(())
    }

    /// Drop every message after the first `len`
    pub fn truncate(&mut self, len: usize) {
        if len < self.messages.len() {
            self.messages.truncate(len);
            self.persist();
        }
    }

    /// Remove all messages
    pub fn clear(&mut self) {
        self.messages.clear();
        if let Some(store) = &self.store
            && let Err(e) = store.remove(HISTORY_KEY)
        {
            tracing::warn!(error = %e, "failed to clear conversation history");
        }
    }

    /// Serialize the log to its storage representation
    ///
    /// # Errors
    ///
    /// Returns error if a message cannot be serialized
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.messages)?)
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let result = self.encode().and_then(|raw| store.save(HISTORY_KEY, &raw));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist conversation history");
        }
    }
}

fn decode(raw: &str) -> Result<Vec<Message>> {
    Ok(serde_json::from_str(raw)?)
}
