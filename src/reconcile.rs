//! Client-side sync reconciliation.
//!
//! Each client holds a read-model cache of the store (tasks, the open
//! thread, notifications) refreshed by polling. The cache is only ever
//! mutated through `reconcile(snapshot)`: aggregates are re-derived from
//! the fresh snapshot, the open thread is matched and replaced by key
//! rather than by object identity, and optimistic local sends live in
//! their own pending list so a failed write rolls back cleanly without
//! touching the canonical cache.

use std::collections::HashMap;

use serde::Serialize;
use ulid::Ulid;

use crate::messages::{unread_count, Message, ThreadKey};
use crate::notify::Notification;
use crate::task::{Task, TaskStatus};

/// What one poll tick fetched for the relevant actor.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    /// Messages of the thread named by the scope's `open_thread`, when set.
    pub open_thread_messages: Option<Vec<Message>>,
    pub notifications: Vec<Notification>,
}

/// Who and what a client is looking at. Read fresh on every tick, never
/// captured once at loop start: the open thread and viewed worker change
/// while the loop is running.
#[derive(Debug, Clone, Default)]
pub struct SyncScope {
    /// A worker device syncs its own tasks.
    pub worker_id: Option<String>,
    /// The office console syncs tasks for whichever worker is on screen.
    pub viewed_worker_id: Option<String>,
    pub open_thread: Option<ThreadKey>,
}

/// Tasks grouped by status, re-derived from each snapshot.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StatusCounts {
    pub unassigned: usize,
    pub pending_acceptance: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl StatusCounts {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut counts = StatusCounts::default();
        for task in tasks {
            match task.status {
                TaskStatus::Unassigned => counts.unassigned += 1,
                TaskStatus::PendingAcceptance => counts.pending_acceptance += 1,
                TaskStatus::Accepted => counts.accepted += 1,
                TaskStatus::Rejected => counts.rejected += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
            }
        }
        counts
    }
}

/// Lifecycle of one optimistic send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    Pending,
    Confirmed,
    Failed,
}

/// A locally rendered message awaiting server confirmation.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub temp_id: String,
    pub thread: ThreadKey,
    pub text: String,
    pub state: PendingState,
}

/// Signal emitted by a reconcile pass.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncSignal {
    /// The open thread gained messages from the other participant. Emitted
    /// once per observed increase, never once per tick.
    NewMessages { thread: ThreadKey, count: usize },
}

/// The client-held view of server state.
#[derive(Debug)]
pub struct ViewState {
    /// Display name of this client's participant ("Office" or the worker).
    viewer: String,
    scope: SyncScope,
    tasks: Vec<Task>,
    counts: StatusCounts,
    open_messages: Vec<Message>,
    notifications: Vec<Notification>,
    pending: Vec<PendingSend>,
    /// Last observed per-thread count of messages from the other
    /// participant, for the new-message edge detection.
    seen_other_counts: HashMap<ThreadKey, usize>,
}

impl ViewState {
    pub fn new(viewer: impl Into<String>, scope: SyncScope) -> Self {
        Self {
            viewer: viewer.into(),
            scope,
            tasks: Vec::new(),
            counts: StatusCounts::default(),
            open_messages: Vec::new(),
            notifications: Vec::new(),
            pending: Vec::new(),
            seen_other_counts: HashMap::new(),
        }
    }

    pub fn viewer(&self) -> &str {
        &self.viewer
    }

    pub fn scope(&self) -> SyncScope {
        self.scope.clone()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn counts(&self) -> &StatusCounts {
        &self.counts
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn open_thread(&self) -> Option<&ThreadKey> {
        self.scope.open_thread.as_ref()
    }

    /// Point the console at a different worker's tasks.
    pub fn view_worker(&mut self, worker_id: impl Into<String>) {
        self.scope.viewed_worker_id = Some(worker_id.into());
    }

    /// Open a conversation. Selection survives subsequent polls; only its
    /// contents are replaced, matched by (project, task) key.
    pub fn open_conversation(&mut self, key: ThreadKey) {
        if self.scope.open_thread.as_ref() != Some(&key) {
            self.open_messages.clear();
        }
        self.scope.open_thread = Some(key);
    }

    pub fn close_conversation(&mut self) {
        self.scope.open_thread = None;
        self.open_messages.clear();
    }

    /// Unread count for the open thread, from the canonical cache.
    pub fn open_unread(&self) -> usize {
        unread_count(&self.open_messages, &self.viewer)
    }

    /// Canonical messages of the open thread plus pending local sends, in
    /// render order.
    pub fn displayed_messages(&self) -> Vec<Message> {
        let mut messages = self.open_messages.clone();
        let open = self.scope.open_thread.as_ref();
        for pending in &self.pending {
            if pending.state == PendingState::Pending && Some(&pending.thread) == open {
                messages.push(Message {
                    id: pending.temp_id.clone(),
                    project_id: pending.thread.project_id.clone(),
                    task_id: pending.thread.task_id.clone(),
                    sender: self.viewer.clone(),
                    text: pending.text.clone(),
                    timestamp: chrono::Utc::now(),
                    read: false,
                });
            }
        }
        messages
    }

    // =========================================================================
    // Optimistic sends: {pending, confirmed, failed}, never a direct
    // mutation of the canonical cache.
    // =========================================================================

    /// Render a send locally before the server confirms it. Returns the
    /// temporary id.
    pub fn optimistic_send(&mut self, thread: ThreadKey, text: impl Into<String>) -> String {
        let temp_id = format!("tmp-{}", Ulid::new().to_string().to_lowercase());
        self.pending.push(PendingSend {
            temp_id: temp_id.clone(),
            thread,
            text: text.into(),
            state: PendingState::Pending,
        });
        temp_id
    }

    /// The server accepted the send: the temporary entry is replaced by the
    /// canonical message (server id and timestamp).
    pub fn confirm_send(&mut self, temp_id: &str, message: Message) {
        if let Some(pending) = self.pending.iter_mut().find(|p| p.temp_id == temp_id) {
            pending.state = PendingState::Confirmed;
            if self.scope.open_thread.as_ref() == Some(&pending.thread) {
                self.open_messages.push(message);
            }
        }
        self.pending.retain(|p| p.state != PendingState::Confirmed);
    }

    /// The send failed: drop the temporary entry and hand the text back so
    /// the compose box can be restored. Never silently lose the text.
    pub fn fail_send(&mut self, temp_id: &str) -> Option<String> {
        let pos = self.pending.iter().position(|p| p.temp_id == temp_id)?;
        let mut pending = self.pending.remove(pos);
        pending.state = PendingState::Failed;
        Some(pending.text)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Merge a fresh snapshot into the view. The single entry point for
    /// cache updates: aggregates are re-derived, the open thread is
    /// replaced by key, and a new-message signal fires once per observed
    /// increase in messages from the other participant.
    pub fn reconcile(&mut self, snapshot: Snapshot) -> Vec<SyncSignal> {
        let mut signals = Vec::new();

        self.counts = StatusCounts::from_tasks(&snapshot.tasks);
        self.tasks = snapshot.tasks;
        self.notifications = snapshot.notifications;

        if let (Some(open), Some(fresh)) = (
            self.scope.open_thread.clone(),
            snapshot.open_thread_messages,
        ) {
            let other_count = fresh
                .iter()
                .filter(|message| message.sender != self.viewer)
                .count();
            // First observation of a thread sets the baseline without
            // signalling: opening an old conversation is not a
            // new-message event.
            let seen = self
                .seen_other_counts
                .get(&open)
                .copied()
                .unwrap_or(other_count);

            if other_count > seen {
                signals.push(SyncSignal::NewMessages {
                    thread: open.clone(),
                    count: other_count - seen,
                });
            }
            // Drop pending entries whose send landed but whose confirm
            // reply was lost. The store stamped its own message id, so the
            // match is on thread plus this viewer's text, not on the
            // temporary id.
            let viewer = &self.viewer;
            self.pending.retain(|p| {
                p.thread != open
                    || !fresh
                        .iter()
                        .any(|m| &m.sender == viewer && m.text == p.text)
            });

            self.seen_other_counts.insert(open, other_count);

            self.open_messages = fresh;
        }

        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(id: &str, sender: &str, text: &str) -> Message {
        Message {
            id: id.to_string(),
            project_id: "p1".to_string(),
            task_id: "t1".to_string(),
            sender: sender.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            read: false,
        }
    }

    fn task_with_status(status: TaskStatus) -> Task {
        let mut task = Task::new("p1", "job");
        task.status = status;
        task
    }

    fn view() -> ViewState {
        let mut view = ViewState::new("Dana", SyncScope::default());
        view.open_conversation(ThreadKey::new("p1", "t1"));
        view
    }

    #[test]
    fn counts_are_rederived_each_reconcile() {
        let mut view = ViewState::new("Dana", SyncScope::default());
        let snapshot = Snapshot {
            tasks: vec![
                task_with_status(TaskStatus::Accepted),
                task_with_status(TaskStatus::Accepted),
                task_with_status(TaskStatus::Completed),
            ],
            ..Default::default()
        };
        view.reconcile(snapshot);
        assert_eq!(view.counts().accepted, 2);
        assert_eq!(view.counts().completed, 1);

        view.reconcile(Snapshot::default());
        assert_eq!(*view.counts(), StatusCounts::default());
    }

    #[test]
    fn open_thread_survives_reconcile_and_contents_replace_by_key() {
        let mut view = view();
        let snapshot = Snapshot {
            open_thread_messages: Some(vec![message("m1", "Office", "hello")]),
            ..Default::default()
        };
        view.reconcile(snapshot);
        assert_eq!(view.open_thread(), Some(&ThreadKey::new("p1", "t1")));
        assert_eq!(view.displayed_messages().len(), 1);
    }

    #[test]
    fn first_observation_sets_baseline_without_signal() {
        let mut view = view();
        let snapshot = Snapshot {
            open_thread_messages: Some(vec![
                message("m1", "Office", "old one"),
                message("m2", "Office", "old two"),
            ]),
            ..Default::default()
        };
        let signals = view.reconcile(snapshot);
        assert!(signals.is_empty());
    }

    #[test]
    fn signal_fires_once_per_increase_not_per_tick() {
        let mut view = view();
        view.reconcile(Snapshot {
            open_thread_messages: Some(vec![message("m1", "Office", "one")]),
            ..Default::default()
        });

        // Same contents on the next tick: no signal.
        let signals = view.reconcile(Snapshot {
            open_thread_messages: Some(vec![message("m1", "Office", "one")]),
            ..Default::default()
        });
        assert!(signals.is_empty());

        // A second office message arrives: exactly one signal.
        let signals = view.reconcile(Snapshot {
            open_thread_messages: Some(vec![
                message("m1", "Office", "one"),
                message("m2", "Office", "two"),
            ]),
            ..Default::default()
        });
        assert_eq!(
            signals,
            vec![SyncSignal::NewMessages {
                thread: ThreadKey::new("p1", "t1"),
                count: 1
            }]
        );

        // And not again on the following tick.
        let signals = view.reconcile(Snapshot {
            open_thread_messages: Some(vec![
                message("m1", "Office", "one"),
                message("m2", "Office", "two"),
            ]),
            ..Default::default()
        });
        assert!(signals.is_empty());
    }

    #[test]
    fn own_sends_never_signal() {
        let mut view = view();
        view.reconcile(Snapshot {
            open_thread_messages: Some(vec![]),
            ..Default::default()
        });

        let signals = view.reconcile(Snapshot {
            open_thread_messages: Some(vec![message("m1", "Dana", "on my way")]),
            ..Default::default()
        });
        assert!(signals.is_empty());
    }

    #[test]
    fn optimistic_send_renders_then_confirms() {
        let mut view = view();
        let temp_id = view.optimistic_send(ThreadKey::new("p1", "t1"), "omw");
        assert!(temp_id.starts_with("tmp-"));
        assert_eq!(view.displayed_messages().len(), 1);
        assert_eq!(view.pending_count(), 1);

        view.confirm_send(&temp_id, message("m9", "Dana", "omw"));
        assert_eq!(view.pending_count(), 0);
        let displayed = view.displayed_messages();
        assert_eq!(displayed.len(), 1);
        assert_eq!(displayed[0].id, "m9");
    }

    #[test]
    fn landed_send_with_lost_confirm_is_cleaned_up_by_reconcile() {
        let mut view = view();
        view.optimistic_send(ThreadKey::new("p1", "t1"), "omw");

        // The send reached the store (it comes back under a server id)
        // but confirm_send was never called. Reconcile must retire the
        // pending entry instead of rendering a duplicate phantom.
        let signals = view.reconcile(Snapshot {
            open_thread_messages: Some(vec![message("m9", "Dana", "omw")]),
            ..Default::default()
        });
        assert!(signals.is_empty());
        assert_eq!(view.pending_count(), 0);

        let displayed = view.displayed_messages();
        assert_eq!(displayed.len(), 1);
        assert_eq!(displayed[0].id, "m9");
    }

    #[test]
    fn pending_sends_for_other_threads_survive_reconcile() {
        let mut view = view();
        view.optimistic_send(ThreadKey::new("p1", "t2"), "omw");

        // Same text lands on the open thread from the same sender; the
        // pending entry belongs to a different thread and must stay.
        view.reconcile(Snapshot {
            open_thread_messages: Some(vec![message("m9", "Dana", "omw")]),
            ..Default::default()
        });
        assert_eq!(view.pending_count(), 1);
    }

    #[test]
    fn failed_send_restores_compose_text() {
        let mut view = view();
        let temp_id = view.optimistic_send(ThreadKey::new("p1", "t1"), "gate code?");
        let restored = view.fail_send(&temp_id);
        assert_eq!(restored.as_deref(), Some("gate code?"));
        assert_eq!(view.pending_count(), 0);
        assert!(view.displayed_messages().is_empty());
    }

    #[test]
    fn switching_conversation_clears_stale_contents() {
        let mut view = view();
        view.reconcile(Snapshot {
            open_thread_messages: Some(vec![message("m1", "Office", "one")]),
            ..Default::default()
        });
        view.open_conversation(ThreadKey::new("p1", "t2"));
        assert!(view.displayed_messages().is_empty());
        assert_eq!(view.open_thread(), Some(&ThreadKey::new("p1", "t2")));
    }
}
