//! Conversation metadata — titles and timestamps per thread, per user.
//!
//! Stored as a single JSON array at `{data_dir}/conversations.json`. The
//! orchestrator never reads this; only the CLI uses it to list and title
//! threads.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Metadata for one conversation thread.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConversationRecord {
    pub thread_id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// JSON-file conversation metadata store.
pub struct ConversationStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ConversationStore {
    /// Open the store rooted at `data_dir` (created if missing).
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;
        Ok(ConversationStore {
            path: data_dir.join("conversations.json"),
            lock: Mutex::new(()),
        })
    }

    /// Conversations for `user_id`, most recently updated first.
    pub fn list(&self, user_id: &str) -> Result<Vec<ConversationRecord>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records: Vec<_> = self
            .read_all()?
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    /// Register a new conversation. An existing thread id is left untouched.
    pub fn create(&self, thread_id: &str, user_id: &str, title: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.read_all()?;
        if records.iter().any(|r| r.thread_id == thread_id) {
            debug!(thread_id = %thread_id, "Conversation already exists");
            return Ok(());
        }
        let now = Utc::now();
        records.push(ConversationRecord {
            thread_id: thread_id.to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        });
        self.write_all(&records)
    }

    pub fn update_title(&self, thread_id: &str, title: &str) -> Result<()> {
        self.modify(thread_id, |r| {
            r.title = title.to_string();
            r.updated_at = Utc::now();
        })
    }

    /// Bump `updated_at` to now.
    pub fn touch(&self, thread_id: &str) -> Result<()> {
        self.modify(thread_id, |r| r.updated_at = Utc::now())
    }

    pub fn get(&self, thread_id: &str) -> Result<Option<ConversationRecord>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self
            .read_all()?
            .into_iter()
            .find(|r| r.thread_id == thread_id))
    }

    fn modify(&self, thread_id: &str, f: impl FnOnce(&mut ConversationRecord)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.read_all()?;
        match records.iter_mut().find(|r| r.thread_id == thread_id) {
            Some(record) => {
                f(record);
                self.write_all(&records)
            }
            None => {
                warn!(thread_id = %thread_id, "Unknown conversation, metadata not updated");
                Ok(())
            }
        }
    }

    fn read_all(&self) -> Result<Vec<ConversationRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).with_context(|| format!("parsing {}", self.path.display()))
    }

    fn write_all(&self, records: &[ConversationRecord]) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let json = serde_json::to_string_pretty(records)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_list_per_user() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        store.create("t1", "alice", "First").unwrap();
        store.create("t2", "bob", "Other user").unwrap();

        let alice = store.list("alice").unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].title, "First");
        assert!(store.list("carol").unwrap().is_empty());
    }

    #[test]
    fn test_list_newest_first_after_touch() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        store.create("old", "u", "Old").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.create("new", "u", "New").unwrap();
        assert_eq!(store.list("u").unwrap()[0].thread_id, "new");

        std::thread::sleep(std::time::Duration::from_millis(5));
        store.touch("old").unwrap();
        assert_eq!(store.list("u").unwrap()[0].thread_id, "old");
    }

    #[test]
    fn test_update_title_and_duplicate_create() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        store.create("t", "u", "New Conversation").unwrap();
        store.update_title("t", "Sales analysis...").unwrap();
        store.create("t", "u", "ignored").unwrap();

        let record = store.get("t").unwrap().unwrap();
        assert_eq!(record.title, "Sales analysis...");
        assert_eq!(store.list("u").unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_thread_is_not_an_error() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();
        store.touch("missing").unwrap();
        assert!(store.get("missing").unwrap().is_none());
    }
}
