//! Notification dispatch for fieldops
//!
//! Notifications are derived from lifecycle transitions, never created
//! directly by a client. A worker's own action emits nothing back to that
//! worker; only office-initiated assignment reaches a device. Records are
//! immutable once created except for the `read` flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::Result;
use crate::store::{write_atomic, FileLock, Store, DEFAULT_LOCK_TIMEOUT_MS};

/// What happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    TaskReassigned,
}

impl NotificationKind {
    /// Reassignment is disruptive to a schedule already agreed on.
    pub fn priority(&self) -> NotificationPriority {
        match self {
            NotificationKind::TaskAssigned => NotificationPriority::Normal,
            NotificationKind::TaskReassigned => NotificationPriority::High,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Normal,
    High,
}

/// A notification record for one worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    /// Resolved from the task's assignee at creation time; never
    /// re-resolved later.
    pub target_worker_id: String,
    pub priority: NotificationPriority,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// Dispatcher over the record store's notification log.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    store: Store,
}

impl NotificationDispatcher {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Append a notification derived from a transition effect.
    pub fn emit(
        &self,
        kind: NotificationKind,
        target_worker_id: &str,
        project_id: &str,
        task_id: &str,
    ) -> Result<Notification> {
        let notification = Notification {
            id: Ulid::new().to_string().to_lowercase(),
            kind,
            target_worker_id: target_worker_id.to_string(),
            priority: kind.priority(),
            read: false,
            created_at: Utc::now(),
            project_id: Some(project_id.to_string()),
            task_id: Some(task_id.to_string()),
        };
        self.store
            .append_jsonl(&self.store.notifications_file(), &notification)?;
        Ok(notification)
    }

    /// All notifications for one worker, newest first.
    pub fn list_for(&self, worker_id: &str) -> Result<Vec<Notification>> {
        let mut notifications: Vec<Notification> =
            self.store.read_jsonl(&self.store.notifications_file())?;
        notifications.retain(|n| n.target_worker_id == worker_id);
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(notifications)
    }

    pub fn unread_count_for(&self, worker_id: &str) -> Result<usize> {
        Ok(self
            .list_for(worker_id)?
            .iter()
            .filter(|n| !n.read)
            .count())
    }

    /// Flip `read` on every unread notification for the worker. Returns how
    /// many were newly marked.
    pub fn mark_read(&self, worker_id: &str) -> Result<usize> {
        let path = self.store.notifications_file();
        if !path.exists() {
            return Ok(0);
        }

        let lock_path = std::path::PathBuf::from(format!("{}.lock", path.display()));
        let _lock = FileLock::acquire(&lock_path, DEFAULT_LOCK_TIMEOUT_MS)?;

        let mut notifications: Vec<Notification> = self.store.read_jsonl(&path)?;
        let mut flipped = 0;
        for notification in &mut notifications {
            if notification.target_worker_id == worker_id && !notification.read {
                notification.read = true;
                flipped += 1;
            }
        }

        if flipped > 0 {
            let mut buffer = Vec::new();
            for notification in &notifications {
                let json = serde_json::to_string(notification)?;
                buffer.extend_from_slice(json.as_bytes());
                buffer.push(b'\n');
            }
            write_atomic(&path, &buffer)?;
        }

        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dispatcher() -> (TempDir, NotificationDispatcher) {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path().to_path_buf());
        store.init().unwrap();
        (temp, NotificationDispatcher::new(store))
    }

    #[test]
    fn emit_and_list_per_worker() {
        let (_temp, dispatcher) = dispatcher();
        dispatcher
            .emit(NotificationKind::TaskAssigned, "w1", "p1", "t1")
            .unwrap();
        dispatcher
            .emit(NotificationKind::TaskReassigned, "w2", "p1", "t2")
            .unwrap();

        let for_w1 = dispatcher.list_for("w1").unwrap();
        assert_eq!(for_w1.len(), 1);
        assert_eq!(for_w1[0].kind, NotificationKind::TaskAssigned);
        assert_eq!(for_w1[0].priority, NotificationPriority::Normal);

        let for_w2 = dispatcher.list_for("w2").unwrap();
        assert_eq!(for_w2[0].priority, NotificationPriority::High);
    }

    #[test]
    fn mark_read_only_touches_target_worker() {
        let (_temp, dispatcher) = dispatcher();
        dispatcher
            .emit(NotificationKind::TaskAssigned, "w1", "p1", "t1")
            .unwrap();
        dispatcher
            .emit(NotificationKind::TaskAssigned, "w2", "p1", "t2")
            .unwrap();

        assert_eq!(dispatcher.mark_read("w1").unwrap(), 1);
        assert_eq!(dispatcher.unread_count_for("w1").unwrap(), 0);
        assert_eq!(dispatcher.unread_count_for("w2").unwrap(), 1);
    }
}
