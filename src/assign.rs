//! Assignment engine and effect runner.
//!
//! Orchestrates a lifecycle transition end to end: read the task, run the
//! pure state machine, install the result with a stale-state guard, then
//! apply the derived effects (thread message, notification, activity trail)
//! per target. The activity sink is best-effort; everything else surfaces
//! errors to the caller.

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityEntry, ActivityLog};
use crate::error::{Error, Result};
use crate::lifecycle::{self, Effect, TaskAction};
use crate::messages::{MessageThreads, ThreadKey};
use crate::notify::NotificationDispatcher;
use crate::store::Store;
use crate::task::{Task, TaskEdit};

/// One assignment tuple. Bulk assignment is a list of these spanning any
/// number of projects; the "same worker and date for every selected task"
/// convenience expands into this shape before the engine sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    pub project_id: String,
    pub task_id: String,
    pub worker_id: String,
    pub date: String,
    pub time: String,
    pub hours: f64,
}

impl AssignRequest {
    /// Expand the uniform mode: one worker and schedule applied to every
    /// selected (project, task) pair.
    pub fn uniform(
        targets: &[(String, String)],
        worker_id: &str,
        date: &str,
        time: &str,
        hours: f64,
    ) -> Vec<AssignRequest> {
        targets
            .iter()
            .map(|(project_id, task_id)| AssignRequest {
                project_id: project_id.clone(),
                task_id: task_id.clone(),
                worker_id: worker_id.to_string(),
                date: date.to_string(),
                time: time.to_string(),
                hours,
            })
            .collect()
    }
}

/// Per-tuple outcome of a bulk assignment. A partial failure reports which
/// tuples succeeded and which failed; it never aborts the batch.
#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    pub succeeded: Vec<BulkSuccess>,
    pub failed: Vec<BulkFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSuccess {
    pub project_id: String,
    pub task_id: String,
    pub worker_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub project_id: String,
    pub task_id: String,
    pub error: String,
}

impl BulkReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The engine every mutating command goes through.
#[derive(Debug, Clone)]
pub struct Engine {
    store: Store,
    threads: MessageThreads,
    dispatcher: NotificationDispatcher,
    activity: ActivityLog,
}

impl Engine {
    pub fn new(store: Store) -> Self {
        let threads = MessageThreads::new(store.clone());
        let dispatcher = NotificationDispatcher::new(store.clone());
        let activity = ActivityLog::for_store(&store);
        Self {
            store,
            threads,
            dispatcher,
            activity,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn threads(&self) -> &MessageThreads {
        &self.threads
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Run one lifecycle action against a task and apply its effects.
    ///
    /// The status read before the transition is re-checked inside the write
    /// lock; losing that race returns `StaleState` and nothing is written.
    pub fn transition(
        &self,
        project_id: &str,
        task_id: &str,
        action: &TaskAction,
        actor: &str,
    ) -> Result<Task> {
        let current = self.store.read_task(project_id, task_id)?;
        let transition = lifecycle::apply(&current, action, actor)?;
        self.commit(project_id, task_id, transition, actor)
    }

    /// Install a computed transition and apply its effects. The write
    /// precondition is `transition.previous_status` — the status of the
    /// observation the transition was built from — so a task that moved
    /// since that read loses the race as `StaleState` instead of being
    /// overwritten.
    fn commit(
        &self,
        project_id: &str,
        task_id: &str,
        transition: lifecycle::Transition,
        actor: &str,
    ) -> Result<Task> {
        self.store
            .replace_task(project_id, transition.task.clone(), transition.previous_status)?;

        let key = ThreadKey::new(project_id, task_id);
        for effect in &transition.effects {
            match effect {
                Effect::MessageAppend { text } => {
                    self.threads.send(&key, actor, text)?;
                }
                Effect::Notify { kind, worker_id } => {
                    self.dispatcher.emit(*kind, worker_id, project_id, task_id)?;
                }
            }
        }

        // Audit failures are logged, never surfaced.
        for draft in &transition.activity {
            let entry = ActivityEntry::new(project_id, task_id, &draft.action, actor)
                .with_details(draft.details.clone());
            self.activity.append_best_effort(&entry);
        }

        Ok(transition.task)
    }

    /// Single assignment. Reassignment of a live task is destructive (it
    /// resets another worker's in-flight status), so it is refused until
    /// the caller confirms with fresh data.
    ///
    /// The confirmation check and the write share one observation of the
    /// task: the transition built here carries the observed status into
    /// `commit` as the write precondition, so a task assigned by someone
    /// else between the gate and the write is a `StaleState` conflict,
    /// never an unconfirmed reassignment.
    pub fn assign(
        &self,
        request: &AssignRequest,
        actor: &str,
        confirm_reassign: bool,
    ) -> Result<Task> {
        let workers = self.store.read_workers()?;
        let worker = workers.require(&request.worker_id)?;

        let action = TaskAction::Assign {
            worker_id: worker.id.clone(),
            worker_name: worker.name.clone(),
            date: request.date.clone(),
            time: request.time.clone(),
            hours: request.hours,
        };

        let current = self.store.read_task(&request.project_id, &request.task_id)?;
        let transition = lifecycle::apply(&current, &action, actor)?;
        if transition.is_reassignment && !confirm_reassign {
            return Err(Error::ReassignConfirmationRequired {
                task_id: request.task_id.clone(),
                status: current.status.to_string(),
            });
        }

        self.commit(&request.project_id, &request.task_id, transition, actor)
    }

    /// Bulk cross-project assignment: each tuple is applied independently
    /// and atomically per task. One ineligible task is a per-item failure,
    /// not a batch abort.
    pub fn assign_bulk(
        &self,
        requests: &[AssignRequest],
        actor: &str,
        confirm_reassign: bool,
    ) -> BulkReport {
        let mut report = BulkReport {
            succeeded: Vec::new(),
            failed: Vec::new(),
        };

        for request in requests {
            match self.assign(request, actor, confirm_reassign) {
                Ok(_) => report.succeeded.push(BulkSuccess {
                    project_id: request.project_id.clone(),
                    task_id: request.task_id.clone(),
                    worker_id: request.worker_id.clone(),
                }),
                Err(err) => report.failed.push(BulkFailure {
                    project_id: request.project_id.clone(),
                    task_id: request.task_id.clone(),
                    error: err.to_string(),
                }),
            }
        }

        report
    }

    /// Office edit: no status change, one activity entry per changed field.
    pub fn edit(
        &self,
        project_id: &str,
        task_id: &str,
        edit: TaskEdit,
        actor: &str,
    ) -> Result<Task> {
        self.transition(project_id, task_id, &TaskAction::Edit(edit), actor)
    }
}
