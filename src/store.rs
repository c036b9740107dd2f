//! Record store for fieldops
//!
//! Key-value persistence over a data directory. One JSON document per
//! project (owning its tasks), one document for the worker registry, JSONL
//! files for threads and notifications, and one file per activity entry.
//! No transactions across keys; writes are last-write-wins at document
//! granularity.
//!
//! # Directory Structure
//!
//! ```text
//! <data_dir>/
//!   fieldops.toml                  # optional configuration
//!   actor                          # persisted actor identity
//!   projects/<project_id>.json     # project document with its tasks
//!   workers.json                   # worker registry
//!   threads/<project>--<task>.jsonl
//!   notifications.jsonl
//!   activity/<timestamp>-<id>.json
//! ```
//!
//! Mutating writes hold a lock on `<file>.lock` and land via temp + rename,
//! so concurrent readers never observe a partial document.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::project::Project;
use crate::task::{Task, TaskStatus};
use crate::worker::WorkerRegistry;

pub const PROJECTS_DIR: &str = "projects";
pub const THREADS_DIR: &str = "threads";
pub const ACTIVITY_DIR: &str = "activity";
pub const WORKERS_FILE: &str = "workers.json";
pub const NOTIFICATIONS_FILE: &str = "notifications.jsonl";
const ACTOR_FILE: &str = "actor";

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Retry interval while waiting for a contended lock
const LOCK_RETRY_INTERVAL_MS: u64 = 50;

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // Windows surfaces sharing violations as "Other"; treat as contention
    // so callers get Err(LockFailed) after the timeout.
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// A file lock guard that releases the lock when dropped
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquire an exclusive lock with a timeout, creating the lock file if
    /// it does not exist.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let retry_interval = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(FileLock { file }),
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(retry_interval);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Storage manager for the fieldops data directory
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Open an existing store, failing when it was never initialized.
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        let store = Self::new(data_dir);
        if !store.is_initialized() {
            return Err(Error::StoreNotInitialized(store.data_dir.clone()));
        }
        Ok(store)
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.data_dir.join(PROJECTS_DIR)
    }

    pub fn project_file(&self, project_id: &str) -> PathBuf {
        self.projects_dir().join(format!("{project_id}.json"))
    }

    pub fn workers_file(&self) -> PathBuf {
        self.data_dir.join(WORKERS_FILE)
    }

    pub fn threads_dir(&self) -> PathBuf {
        self.data_dir.join(THREADS_DIR)
    }

    pub fn thread_file(&self, project_id: &str, task_id: &str) -> PathBuf {
        self.threads_dir()
            .join(format!("{project_id}--{task_id}.jsonl"))
    }

    pub fn notifications_file(&self) -> PathBuf {
        self.data_dir.join(NOTIFICATIONS_FILE)
    }

    pub fn activity_dir(&self) -> PathBuf {
        self.data_dir.join(ACTIVITY_DIR)
    }

    fn actor_file(&self) -> PathBuf {
        self.data_dir.join(ACTOR_FILE)
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Create the directory layout and empty collections.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(self.projects_dir())?;
        fs::create_dir_all(self.threads_dir())?;
        fs::create_dir_all(self.activity_dir())?;

        let workers = self.workers_file();
        if !workers.exists() {
            self.write_json(&workers, &WorkerRegistry::default())?;
        }

        let notifications = self.notifications_file();
        if !notifications.exists() {
            File::create(&notifications)?;
        }

        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.projects_dir().exists()
    }

    // =========================================================================
    // File I/O helpers (atomic writes for safety)
    // =========================================================================

    /// Write JSON atomically (temp + rename) under the document's lock.
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let _lock = FileLock::acquire(lock_path(path), DEFAULT_LOCK_TIMEOUT_MS)?;
        let json = serde_json::to_string_pretty(data)?;
        write_atomic(path, json.as_bytes())
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Append one record to a JSONL file under its lock.
    pub fn append_jsonl<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let _lock = FileLock::acquire(lock_path(path), DEFAULT_LOCK_TIMEOUT_MS)?;
        let json = serde_json::to_string(record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{json}")?;
        file.sync_all()?;
        Ok(())
    }

    /// Read all records from a JSONL file; a missing file is empty.
    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: T = serde_json::from_str(&line)?;
            records.push(record);
        }

        Ok(records)
    }

    /// Rewrite a whole JSONL file under its lock.
    pub fn write_jsonl<T: Serialize>(&self, path: &Path, records: &[T]) -> Result<()> {
        let _lock = FileLock::acquire(lock_path(path), DEFAULT_LOCK_TIMEOUT_MS)?;
        let mut buffer = Vec::new();
        for record in records {
            let json = serde_json::to_string(record)?;
            buffer.extend_from_slice(json.as_bytes());
            buffer.push(b'\n');
        }
        write_atomic(path, &buffer)
    }

    // =========================================================================
    // Project documents
    // =========================================================================

    pub fn read_project(&self, project_id: &str) -> Result<Project> {
        let path = self.project_file(project_id);
        if !path.exists() {
            return Err(Error::ProjectNotFound(project_id.to_string()));
        }
        self.read_json(&path)
    }

    pub fn put_project(&self, project: &Project) -> Result<()> {
        self.write_json(&self.project_file(&project.id), project)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let dir = self.projects_dir();
        if !dir.exists() {
            return Err(Error::StoreNotInitialized(self.data_dir.clone()));
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut projects = Vec::new();
        for path in paths {
            projects.push(self.read_json(&path)?);
        }
        Ok(projects)
    }

    pub fn delete_project(&self, project_id: &str) -> Result<()> {
        let path = self.project_file(project_id);
        if !path.exists() {
            return Err(Error::ProjectNotFound(project_id.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// Read, mutate, and write one project document under its lock.
    pub fn update_project<T, F>(&self, project_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Project) -> Result<T>,
    {
        let path = self.project_file(project_id);
        if !path.exists() {
            return Err(Error::ProjectNotFound(project_id.to_string()));
        }

        let _lock = FileLock::acquire(lock_path(&path), DEFAULT_LOCK_TIMEOUT_MS)?;
        let mut project: Project = self.read_json(&path)?;
        let out = f(&mut project)?;
        let json = serde_json::to_string_pretty(&project)?;
        write_atomic(&path, json.as_bytes())?;
        Ok(out)
    }

    // =========================================================================
    // Task access (through the owning project)
    // =========================================================================

    pub fn read_task(&self, project_id: &str, task_id: &str) -> Result<Task> {
        let project = self.read_project(project_id)?;
        project.task(task_id).cloned()
    }

    /// Replace a task inside its project document, re-checking a status
    /// precondition inside the write lock. A mismatch means another client
    /// won the race; the caller gets `StaleState` and must re-fetch, never
    /// a silent overwrite.
    pub fn replace_task(
        &self,
        project_id: &str,
        task: Task,
        expected_status: TaskStatus,
    ) -> Result<()> {
        self.update_project(project_id, |project| {
            let current = project.task_mut(&task.id)?;
            if current.status != expected_status {
                return Err(Error::StaleState {
                    task_id: task.id.clone(),
                    expected: expected_status.to_string(),
                    found: current.status.to_string(),
                });
            }
            *current = task;
            Ok(())
        })
    }

    /// Tasks assigned to one worker, across all projects.
    pub fn tasks_for_worker(&self, worker_id: &str) -> Result<Vec<Task>> {
        let mut tasks = Vec::new();
        for project in self.list_projects()? {
            for task in project.tasks {
                if task.assigned_to.as_deref() == Some(worker_id) {
                    tasks.push(task);
                }
            }
        }
        Ok(tasks)
    }

    // =========================================================================
    // Worker registry
    // =========================================================================

    pub fn read_workers(&self) -> Result<WorkerRegistry> {
        let path = self.workers_file();
        if !path.exists() {
            return Ok(WorkerRegistry::default());
        }
        self.read_json(&path)
    }

    pub fn update_workers<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut WorkerRegistry) -> Result<T>,
    {
        let path = self.workers_file();
        let _lock = FileLock::acquire(lock_path(&path), DEFAULT_LOCK_TIMEOUT_MS)?;
        let mut registry = if path.exists() {
            self.read_json(&path)?
        } else {
            WorkerRegistry::default()
        };
        let out = f(&mut registry)?;
        let json = serde_json::to_string_pretty(&registry)?;
        write_atomic(&path, json.as_bytes())?;
        Ok(out)
    }

    /// Idempotent boundary call: replace the worker collection wholesale.
    pub fn replace_workers(&self, registry: &WorkerRegistry) -> Result<()> {
        self.write_json(&self.workers_file(), registry)
    }

    // =========================================================================
    // Actor persistence
    // =========================================================================

    pub fn read_actor(&self) -> Option<String> {
        let raw = fs::read_to_string(self.actor_file()).ok()?;
        let actor = raw.trim();
        if actor.is_empty() {
            None
        } else {
            Some(actor.to_string())
        }
    }

    pub fn write_actor(&self, actor: &str) -> Result<()> {
        let actor = actor.trim();
        if actor.is_empty() {
            return Err(Error::InvalidArgument(
                "actor name cannot be empty".to_string(),
            ));
        }
        fs::create_dir_all(&self.data_dir)?;
        write_atomic(&self.actor_file(), format!("{actor}\n").as_bytes())
    }
}

fn lock_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lock", path.display()))
}

/// Atomically write data using temp file + rename so readers never see a
/// partial document.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension(format!("tmp.{}", std::process::id()));
    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path().to_path_buf());
        store.init().unwrap();
        (temp, store)
    }

    #[test]
    fn init_creates_layout() {
        let (_temp, store) = store();
        assert!(store.is_initialized());
        assert!(store.projects_dir().exists());
        assert!(store.workers_file().exists());
        assert!(store.notifications_file().exists());
    }

    #[test]
    fn project_round_trip() {
        let (_temp, store) = store();
        let mut project = Project::new("2025-001", "Acme");
        project.add_task(Task::new("x", "Fit lock"));
        store.put_project(&project).unwrap();

        let loaded = store.read_project(&project.id).unwrap();
        assert_eq!(loaded.client, "Acme");
        assert_eq!(loaded.tasks.len(), 1);
        assert_eq!(loaded.tasks[0].project_id, project.id);
    }

    #[test]
    fn replace_task_rejects_stale_status() {
        let (_temp, store) = store();
        let mut project = Project::new("2025-001", "Acme");
        let task_id = project.add_task(Task::new("x", "Fit lock"));
        store.put_project(&project).unwrap();

        let mut updated = store.read_task(&project.id, &task_id).unwrap();
        updated.status = TaskStatus::PendingAcceptance;

        // Precondition matches on-disk state: write lands.
        store
            .replace_task(&project.id, updated.clone(), TaskStatus::Unassigned)
            .unwrap();

        // Same precondition again: the first write already won.
        let err = store
            .replace_task(&project.id, updated, TaskStatus::Unassigned)
            .unwrap_err();
        assert!(matches!(err, Error::StaleState { .. }));
    }

    #[test]
    fn tasks_for_worker_spans_projects() {
        let (_temp, store) = store();
        for n in 0..2 {
            let mut project = Project::new(format!("2025-00{n}"), "Acme");
            let task_id = project.add_task(Task::new("x", format!("Job {n}")));
            let task = project.task_mut(&task_id).unwrap();
            task.status = TaskStatus::PendingAcceptance;
            task.assigned_to = Some("w1".to_string());
            store.put_project(&project).unwrap();
        }

        let tasks = store.tasks_for_worker("w1").unwrap();
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn jsonl_append_and_read() {
        let (_temp, store) = store();
        let path = store.data_dir().join("sample.jsonl");
        store.append_jsonl(&path, &serde_json::json!({"n": 1})).unwrap();
        store.append_jsonl(&path, &serde_json::json!({"n": 2})).unwrap();
        let records: Vec<serde_json::Value> = store.read_jsonl(&path).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn open_requires_init() {
        let temp = TempDir::new().unwrap();
        let err = Store::open(temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::StoreNotInitialized(_)));
    }
}
