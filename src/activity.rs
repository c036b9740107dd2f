//! Activity log for fieldops
//!
//! Append-only audit trail of every lifecycle transition, one JSON file per
//! entry under `activity/`. Storage order is insertion order (filenames are
//! timestamp + id); display order is `date` descending. The two are kept
//! distinct on purpose: no monotonic clock is assumed across clients, so
//! same-tick entries tie-break on id for a deterministic rendering.
//!
//! The log is a best-effort sink — a failed append must never block the
//! transition that produced it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::{write_atomic, FileLock, Store, DEFAULT_LOCK_TIMEOUT_MS};

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub project_id: String,
    pub task_id: String,
    /// Free-text description of the transition, e.g. "Reassigned to Dana".
    pub action: String,
    /// Actor name.
    pub user: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ActivityEntry {
    pub fn new(
        project_id: impl Into<String>,
        task_id: impl Into<String>,
        action: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            task_id: task_id.into(),
            action: action.into(),
            user: user.into(),
            date: Utc::now(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Option<String>) -> Self {
        self.details = details;
        self
    }
}

/// Activity log manager
#[derive(Debug, Clone)]
pub struct ActivityLog {
    dir: PathBuf,
}

impl ActivityLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn for_store(store: &Store) -> Self {
        Self::new(store.activity_dir())
    }

    /// Append a new entry to the log
    pub fn append(&self, entry: &ActivityEntry) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let lock_path = activity_lock_path(&self.dir);
        let _lock = FileLock::acquire(&lock_path, DEFAULT_LOCK_TIMEOUT_MS)?;

        let path = self.dir.join(entry_filename(entry));
        if path.exists() {
            return Err(Error::OperationFailed(format!(
                "activity entry already exists: {}",
                path.display()
            )));
        }

        let json = serde_json::to_vec_pretty(entry)?;
        write_atomic(&path, &json)?;
        Ok(path)
    }

    /// Best-effort append: failures are logged, never surfaced, so the
    /// audit sink cannot block the primary transition.
    pub fn append_best_effort(&self, entry: &ActivityEntry) {
        if let Err(err) = self.append(entry) {
            tracing::warn!(
                task_id = %entry.task_id,
                action = %entry.action,
                "activity append failed: {err}"
            );
        }
    }

    /// All entries in storage (insertion) order.
    pub fn read_all(&self) -> Result<Vec<ActivityEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut entries = Vec::new();
        for path in paths {
            let content = fs::read_to_string(&path)?;
            let entry: ActivityEntry = serde_json::from_str(&content)?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Entries filtered and sorted for display: `date` descending, id as
    /// the tie-break within a clock tick.
    pub fn read_filtered(
        &self,
        filter: &ActivityFilter,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityEntry>> {
        let mut entries = self.read_all()?;
        entries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));

        let mut filtered: Vec<ActivityEntry> = entries
            .into_iter()
            .filter(|entry| filter.matches(entry))
            .collect();

        if let Some(limit) = limit {
            filtered.truncate(limit);
        }
        Ok(filtered)
    }
}

/// Filter for selecting activity entries
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub user: Option<String>,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

impl ActivityFilter {
    pub fn matches(&self, entry: &ActivityEntry) -> bool {
        if let Some(user) = &self.user {
            if &entry.user != user {
                return false;
            }
        }
        if let Some(project_id) = &self.project_id {
            if &entry.project_id != project_id {
                return false;
            }
        }
        if let Some(task_id) = &self.task_id {
            if &entry.task_id != task_id {
                return false;
            }
        }
        if let Some(since) = &self.since {
            if &entry.date < since {
                return false;
            }
        }
        true
    }
}

/// Format a single entry for human-readable output
pub fn format_entry(entry: &ActivityEntry) -> String {
    let ts = entry.date.to_rfc3339();
    let details = entry
        .details
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default();
    format!(
        "{ts} [{project}/{task}] {user}: {action}{details}",
        project = entry.project_id,
        task = entry.task_id,
        user = entry.user,
        action = entry.action,
    )
}

fn activity_lock_path(dir: &Path) -> PathBuf {
    dir.join("activity.lock")
}

fn entry_filename(entry: &ActivityEntry) -> String {
    let ts = entry.date.format("%Y%m%dT%H%M%S%.3fZ");
    format!("{}-{}.json", ts, entry.id)
}
