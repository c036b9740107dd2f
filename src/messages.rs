//! Message threads for fieldops
//!
//! One append-only log per (project, task) pair, created implicitly on
//! first send. Threads have exactly two participant roles — the assigned
//! worker and the office — so read state is derived: `mark_read` flips
//! every message not sent by the reader.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::store::{write_atomic, FileLock, Store, DEFAULT_LOCK_TIMEOUT_MS};

/// Key of a message thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ThreadKey {
    pub project_id: String,
    pub task_id: String,
}

impl ThreadKey {
    pub fn new(project_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            task_id: task_id.into(),
        }
    }
}

/// A single message. Created on send, mutated only to flip `read`,
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub project_id: String,
    pub task_id: String,
    /// Display name or role tag (e.g. "Office").
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// Thread service over the record store.
#[derive(Debug, Clone)]
pub struct MessageThreads {
    store: Store,
}

impl MessageThreads {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Append a message with a fresh id and the current timestamp. Does not
    /// mark anything read for anyone.
    pub fn send(&self, key: &ThreadKey, sender: &str, text: &str) -> Result<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("message text cannot be empty".to_string()));
        }
        let sender = sender.trim();
        if sender.is_empty() {
            return Err(Error::Validation("message sender cannot be empty".to_string()));
        }

        let message = Message {
            id: Ulid::new().to_string().to_lowercase(),
            project_id: key.project_id.clone(),
            task_id: key.task_id.clone(),
            sender: sender.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            read: false,
        };

        let path = self.store.thread_file(&key.project_id, &key.task_id);
        self.store.append_jsonl(&path, &message)?;
        Ok(message)
    }

    /// All messages of a thread, ordered by time (id as tie-break).
    pub fn messages(&self, key: &ThreadKey) -> Result<Vec<Message>> {
        let path = self.store.thread_file(&key.project_id, &key.task_id);
        let mut messages: Vec<Message> = self.store.read_jsonl(&path)?;
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(messages)
    }

    /// Flip `read` on every message the reader did not send. Returns how
    /// many messages were newly marked.
    pub fn mark_read(&self, key: &ThreadKey, reader: &str) -> Result<usize> {
        let path = self.store.thread_file(&key.project_id, &key.task_id);
        if !path.exists() {
            return Ok(0);
        }

        let lock_path = std::path::PathBuf::from(format!("{}.lock", path.display()));
        let _lock = FileLock::acquire(&lock_path, DEFAULT_LOCK_TIMEOUT_MS)?;

        let mut messages: Vec<Message> = self.store.read_jsonl(&path)?;
        let mut flipped = 0;
        for message in &mut messages {
            if message.sender != reader && !message.read {
                message.read = true;
                flipped += 1;
            }
        }

        if flipped > 0 {
            let mut buffer = Vec::new();
            for message in &messages {
                let json = serde_json::to_string(message)?;
                buffer.extend_from_slice(json.as_bytes());
                buffer.push(b'\n');
            }
            write_atomic(&path, &buffer)?;
        }

        Ok(flipped)
    }

    /// Unread count for one participant.
    pub fn unread_count_for(&self, key: &ThreadKey, for_name: &str) -> Result<usize> {
        Ok(unread_count(&self.messages(key)?, for_name))
    }
}

/// Count of messages addressed to `for_name` that are still unread.
pub fn unread_count(messages: &[Message], for_name: &str) -> usize {
    messages
        .iter()
        .filter(|message| message.sender != for_name && !message.read)
        .count()
}
