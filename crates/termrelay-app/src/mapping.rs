use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use termrelay_types::{SessionHandle, SessionMapping};

/// Conversation-to-session lookups used while relaying a conversation
pub trait MappingStore: Send + Sync {
    fn lookup(&self, thread_key: &str) -> Option<SessionMapping>;

    fn record_activity(&self, thread_key: &str) -> Result<()>;

    fn remove(&self, thread_key: &str) -> Result<bool>;
}

/// Mapping store persisted as a pretty-printed JSON array
pub struct FileMappingStore {
    path: PathBuf,
    mappings: Mutex<HashMap<String, SessionMapping>>,
}

impl FileMappingStore {
    /// Open the store at `path`, loading existing mappings if the file exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            mappings: Mutex::new(HashMap::new()),
        };
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, SessionMapping>>> {
        self.mappings
            .lock()
            .map_err(|_| anyhow!("session mapping lock poisoned"))
    }

    /// Replace the in-memory mappings with the file's content. A missing
    /// file means no mappings.
    pub fn load(&self) -> Result<usize> {
        let mut entries = self.entries()?;
        entries.clear();

        if !self.path.exists() {
            return Ok(0);
        }

        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session mappings from {}", self.path.display()))?;
        let mappings: Vec<SessionMapping> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse session mappings in {}", self.path.display()))?;

        for mapping in mappings {
            entries.insert(mapping.thread_key.clone(), mapping);
        }
        Ok(entries.len())
    }

    /// Write all mappings to the file
    pub fn save(&self) -> Result<()> {
        let entries = self.entries()?;
        self.write(&entries)
    }

    fn write(&self, entries: &HashMap<String, SessionMapping>) -> Result<()> {
        let mut mappings: Vec<&SessionMapping> = entries.values().collect();
        mappings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.thread_key.cmp(&b.thread_key)));

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create mapping directory: {}", parent.display())
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&mappings)
            .context("Failed to serialize session mappings")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write session mappings to {}", self.path.display()))?;
        Ok(())
    }

    /// Link `thread_key` to `session`, replacing any previous link
    pub fn create(
        &self,
        thread_key: impl Into<String>,
        session: SessionHandle,
        channel: impl Into<String>,
    ) -> Result<SessionMapping> {
        let mapping = SessionMapping::new(thread_key.into(), session, channel.into());
        let mut entries = self.entries()?;
        entries.insert(mapping.thread_key.clone(), mapping.clone());
        self.write(&entries)?;
        Ok(mapping)
    }

    pub fn has(&self, thread_key: &str) -> bool {
        self.entries()
            .map(|entries| entries.contains_key(thread_key))
            .unwrap_or(false)
    }

    /// All mappings, oldest first
    pub fn all(&self) -> Vec<SessionMapping> {
        let mut mappings: Vec<SessionMapping> = match self.entries() {
            Ok(entries) => entries.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        mappings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.thread_key.cmp(&b.thread_key)));
        mappings
    }

    /// Thread keys linked to `session`
    pub fn threads_for_session(&self, session: &SessionHandle) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|m| &m.session == session)
            .map(|m| m.thread_key)
            .collect()
    }

    /// Drop mappings idle for longer than `max_inactive`. Returns how many
    /// were removed.
    pub fn cleanup_inactive(&self, max_inactive: Duration) -> Result<usize> {
        let now = Utc::now();
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|_, mapping| now - mapping.last_activity <= max_inactive);

        let removed = before - entries.len();
        if removed > 0 {
            self.write(&entries)?;
        }
        Ok(removed)
    }
}

impl MappingStore for FileMappingStore {
    fn lookup(&self, thread_key: &str) -> Option<SessionMapping> {
        self.entries().ok()?.get(thread_key).cloned()
    }

    fn record_activity(&self, thread_key: &str) -> Result<()> {
        let mut entries = self.entries()?;
        match entries.get_mut(thread_key) {
            Some(mapping) => {
                mapping.last_activity = Utc::now();
                self.write(&entries)
            }
            None => Ok(()),
        }
    }

    fn remove(&self, thread_key: &str) -> Result<bool> {
        let mut entries = self.entries()?;
        let removed = entries.remove(thread_key).is_some();
        if removed {
            self.write(&entries)?;
        }
        Ok(removed)
    }
}
