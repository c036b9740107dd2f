//! Fixed-interval polling driver for the sync reconciler.
//!
//! One poll must finish (or be abandoned on timeout) before the next tick
//! fires; polls for one client never overlap. Each tick re-reads the scope
//! from the shared view cell, so the loop always dispatches against the
//! current selection — never a copy captured when the loop started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::error::{Error, Result};
use crate::messages::MessageThreads;
use crate::notify::NotificationDispatcher;
use crate::reconcile::{Snapshot, SyncScope, SyncSignal, ViewState};
use crate::store::Store;

/// A read surface the reconciler can poll.
pub trait SyncSource: Send + Sync {
    /// Fetch the full snapshot for the scope's actor: their tasks, the open
    /// thread's messages, their notifications.
    fn fetch(&self, scope: &SyncScope) -> Result<Snapshot>;
}

/// The file-backed store as a sync source.
#[derive(Debug, Clone)]
pub struct StoreSyncSource {
    store: Store,
    threads: MessageThreads,
    dispatcher: NotificationDispatcher,
}

impl StoreSyncSource {
    pub fn new(store: Store) -> Self {
        let threads = MessageThreads::new(store.clone());
        let dispatcher = NotificationDispatcher::new(store.clone());
        Self {
            store,
            threads,
            dispatcher,
        }
    }
}

impl SyncSource for StoreSyncSource {
    fn fetch(&self, scope: &SyncScope) -> Result<Snapshot> {
        // A worker device syncs its own tasks; the office console syncs
        // whichever worker it is currently viewing.
        let subject = scope
            .worker_id
            .as_deref()
            .or(scope.viewed_worker_id.as_deref());

        let tasks = match subject {
            Some(worker_id) => self.store.tasks_for_worker(worker_id)?,
            None => {
                let mut tasks = Vec::new();
                for project in self.store.list_projects()? {
                    tasks.extend(project.tasks);
                }
                tasks
            }
        };

        let open_thread_messages = match &scope.open_thread {
            Some(key) => Some(self.threads.messages(key)?),
            None => None,
        };

        // Only a worker device has a notification feed.
        let notifications = match scope.worker_id.as_deref() {
            Some(worker_id) => self.dispatcher.list_for(worker_id)?,
            None => Vec::new(),
        };

        Ok(Snapshot {
            tasks,
            open_thread_messages,
            notifications,
        })
    }
}

/// Handle used to stop a running poller.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The polling loop.
pub struct Poller<S> {
    source: S,
    view: Arc<Mutex<ViewState>>,
    interval: Duration,
    timeout: Duration,
    stop: StopHandle,
}

impl<S> Poller<S>
where
    S: SyncSource + Clone + 'static,
{
    /// Build a poller. The per-poll timeout must be strictly shorter than
    /// the interval so an abandoned poll cannot block the next tick.
    pub fn new(
        source: S,
        view: Arc<Mutex<ViewState>>,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        if timeout >= interval {
            return Err(Error::InvalidConfig(format!(
                "poll timeout ({timeout:?}) must be shorter than the interval ({interval:?})"
            )));
        }
        Ok(Self {
            source,
            view,
            interval,
            timeout,
            stop: StopHandle::new(),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// One poll pass: fetch for the current scope and reconcile. Shared by
    /// the loop and by callers that drive ticks themselves.
    pub fn poll_once(source: &S, view: &Mutex<ViewState>) -> Result<Vec<SyncSignal>> {
        // The scope is read through the cell on every pass, so a thread
        // opened after the loop started is picked up on the next tick.
        let scope = lock_view(view).scope();
        let snapshot = source.fetch(&scope)?;
        Ok(lock_view(view).reconcile(snapshot))
    }

    /// Run until stopped. Signals from each pass are handed to `on_signals`.
    pub async fn run<F>(self, mut on_signals: F)
    where
        F: FnMut(Vec<SyncSignal>),
    {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if self.stop.is_stopped() {
                return;
            }

            let source = self.source.clone();
            let view = Arc::clone(&self.view);
            let fetch = tokio::task::spawn_blocking(move || Self::poll_once(&source, &view));

            match tokio::time::timeout(self.timeout, fetch).await {
                Ok(Ok(Ok(signals))) => {
                    if !signals.is_empty() {
                        on_signals(signals);
                    }
                }
                Ok(Ok(Err(err))) if err.is_transient() => {
                    // Reads are retryable; the next tick retries them.
                    tracing::debug!("transient poll failure: {err}");
                }
                Ok(Ok(Err(err))) => {
                    tracing::warn!("poll failed: {err}");
                }
                Ok(Err(join_err)) => {
                    tracing::warn!("poll task panicked: {join_err}");
                }
                Err(_elapsed) => {
                    tracing::warn!("poll timed out after {:?}, abandoning", self.timeout);
                }
            }
        }
    }
}

/// Lock the view, recovering from a poisoned mutex. The view holds no
/// invariant a panicked holder could have half-applied that the next
/// reconcile does not rebuild, so the guard is taken as-is.
fn lock_view(view: &Mutex<ViewState>) -> std::sync::MutexGuard<'_, ViewState> {
    view.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::{AssignRequest, Engine};
    use crate::messages::ThreadKey;
    use crate::project::Project;
    use crate::task::Task;
    use crate::worker::Worker;
    use tempfile::TempDir;

    fn seeded_store() -> (TempDir, Store, String, String, String) {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path().to_path_buf());
        store.init().unwrap();

        let worker = Worker::new("Dana Reyes");
        let worker_id = worker.id.clone();
        store.update_workers(|registry| registry.insert(worker)).unwrap();

        let mut project = Project::new("2025-001", "Acme");
        let task_id = project.add_task(Task::new("x", "Replace valve"));
        let project_id = project.id.clone();
        store.put_project(&project).unwrap();

        (temp, store, project_id, task_id, worker_id)
    }

    #[test]
    fn fetch_scopes_tasks_to_worker() {
        let (_temp, store, project_id, task_id, worker_id) = seeded_store();
        let engine = Engine::new(store.clone());
        engine
            .assign(
                &AssignRequest {
                    project_id: project_id.clone(),
                    task_id: task_id.clone(),
                    worker_id: worker_id.clone(),
                    date: "2025-10-08".to_string(),
                    time: "09:00".to_string(),
                    hours: 4.0,
                },
                "Office",
                false,
            )
            .unwrap();

        let source = StoreSyncSource::new(store);
        let scope = SyncScope {
            worker_id: Some(worker_id.clone()),
            ..Default::default()
        };
        let snapshot = source.fetch(&scope).unwrap();
        assert_eq!(snapshot.tasks.len(), 1);
        assert_eq!(snapshot.notifications.len(), 1);
    }

    #[test]
    fn poll_once_reads_the_current_scope() {
        let (_temp, store, project_id, task_id, _worker_id) = seeded_store();
        let threads = MessageThreads::new(store.clone());
        let key = ThreadKey::new(&project_id, &task_id);
        threads.send(&key, "Office", "old message").unwrap();

        let source = StoreSyncSource::new(store);
        let view = Mutex::new(ViewState::new("Dana Reyes", SyncScope::default()));

        // First pass: no thread open, nothing fetched for it.
        Poller::<StoreSyncSource>::poll_once(&source, &view).unwrap();

        // The conversation opens between ticks; the next pass must see it
        // without the loop being rebuilt.
        view.lock().unwrap().open_conversation(key.clone());
        Poller::<StoreSyncSource>::poll_once(&source, &view).unwrap();
        assert_eq!(view.lock().unwrap().displayed_messages().len(), 1);

        // A fresh office message then signals exactly once.
        threads.send(&key, "Office", "are you close?").unwrap();
        let signals = Poller::<StoreSyncSource>::poll_once(&source, &view).unwrap();
        assert_eq!(signals.len(), 1);
        let signals = Poller::<StoreSyncSource>::poll_once(&source, &view).unwrap();
        assert!(signals.is_empty());
    }

    #[test]
    fn poll_once_recovers_from_a_poisoned_view() {
        let (_temp, store, ..) = seeded_store();
        let source = StoreSyncSource::new(store);
        let view = Mutex::new(ViewState::new("Office", SyncScope::default()));

        // A panic while holding the lock poisons it; polling must carry on.
        let _ = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = view.lock().unwrap();
                panic!("holder died");
            })
            .join()
        });
        assert!(view.is_poisoned());

        Poller::<StoreSyncSource>::poll_once(&source, &view).unwrap();
    }

    #[test]
    fn timeout_must_be_shorter_than_interval() {
        let (_temp, store, ..) = seeded_store();
        let source = StoreSyncSource::new(store);
        let view = Arc::new(Mutex::new(ViewState::new("Office", SyncScope::default())));
        let result = Poller::new(
            source,
            view,
            Duration::from_secs(1),
            Duration::from_secs(2),
        );
        match result {
            Err(Error::InvalidConfig(_)) => {}
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("expected invalid config"),
        }
    }

    #[tokio::test]
    async fn run_stops_on_handle() {
        let (_temp, store, ..) = seeded_store();
        let source = StoreSyncSource::new(store);
        let view = Arc::new(Mutex::new(ViewState::new("Office", SyncScope::default())));
        let poller = Poller::new(
            source,
            view,
            Duration::from_millis(20),
            Duration::from_millis(10),
        )
        .unwrap();
        let stop = poller.stop_handle();

        let task = tokio::spawn(poller.run(|_signals| {}));
        tokio::time::sleep(Duration::from_millis(60)).await;
        stop.stop();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("poller stopped")
            .unwrap();
    }
}
