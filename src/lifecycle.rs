//! Task lifecycle state machine.
//!
//! Pure logic: (current task, action, actor) -> updated task plus the derived
//! records to append. Cross-cutting side effects (the rejection message, the
//! assignment notification) are returned as effects and applied by the
//! engine, never hand-coded at call sites.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::notify::NotificationKind;
use crate::task::{Task, TaskEdit, TaskStatus};

/// An action requested against a task.
#[derive(Debug, Clone)]
pub enum TaskAction {
    /// Office: assign or reassign a worker with a schedule.
    Assign {
        worker_id: String,
        worker_name: String,
        date: String,
        time: String,
        hours: f64,
    },
    /// Worker: confirm a pending assignment.
    Accept,
    /// Worker: decline a pending assignment with a reason.
    Reject { reason: String },
    /// Worker: begin work on an accepted task.
    Start,
    /// Worker: finish in-progress work. `details` is caller-supplied
    /// metadata (duration, photo count) and opaque here.
    Complete { details: Option<String> },
    /// Office: edit fields without changing status.
    Edit(TaskEdit),
}

impl TaskAction {
    pub fn name(&self) -> &'static str {
        match self {
            TaskAction::Assign { .. } => "assign",
            TaskAction::Accept => "accept",
            TaskAction::Reject { .. } => "reject",
            TaskAction::Start => "start",
            TaskAction::Complete { .. } => "complete",
            TaskAction::Edit(_) => "edit",
        }
    }

    /// Statuses the action is allowed to fire from.
    pub fn allowed_from(&self) -> &'static [TaskStatus] {
        match self {
            TaskAction::Assign { .. } => &[
                TaskStatus::Unassigned,
                TaskStatus::Rejected,
                TaskStatus::PendingAcceptance,
                TaskStatus::Accepted,
                TaskStatus::InProgress,
            ],
            TaskAction::Accept | TaskAction::Reject { .. } => &[TaskStatus::PendingAcceptance],
            TaskAction::Start => &[TaskStatus::Accepted],
            TaskAction::Complete { .. } => &[TaskStatus::InProgress],
            TaskAction::Edit(_) => &[
                TaskStatus::Unassigned,
                TaskStatus::PendingAcceptance,
                TaskStatus::Accepted,
                TaskStatus::Rejected,
                TaskStatus::InProgress,
                TaskStatus::Completed,
            ],
        }
    }
}

/// A pending activity record: description plus optional caller metadata.
/// The effect runner stamps id, timestamp, and actor.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActivityDraft {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ActivityDraft {
    fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            details: None,
        }
    }

    fn with_details(action: impl Into<String>, details: Option<String>) -> Self {
        Self {
            action: action.into(),
            details,
        }
    }
}

/// Side effects of a transition beyond the task write and activity trail.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a message to the task's thread.
    MessageAppend { text: String },
    /// Emit a notification for a worker.
    Notify {
        kind: NotificationKind,
        worker_id: String,
    },
}

/// The full result of a successful transition: the updated task and every
/// record to append.
#[derive(Debug, Clone)]
pub struct Transition {
    pub task: Task,
    pub previous_status: TaskStatus,
    pub activity: Vec<ActivityDraft>,
    pub effects: Vec<Effect>,
    /// True when an assignment replaced a live worker (the destructive
    /// reset the engine must gate behind confirmation).
    pub is_reassignment: bool,
}

/// Apply an action to a task, enforcing the lifecycle guards.
///
/// The input task is not mutated; the updated copy is returned inside the
/// transition. Guard violations return `InvalidTransition` naming the
/// current status and the allowed sources — callers must not coerce.
pub fn apply(task: &Task, action: &TaskAction, actor: &str) -> Result<Transition> {
    let allowed = action.allowed_from();
    if !allowed.contains(&task.status) {
        return Err(Error::InvalidTransition {
            current: task.status.to_string(),
            action: action.name().to_string(),
            allowed: allowed
                .iter()
                .map(|status| status.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    let previous_status = task.status;
    let mut next = task.clone();
    let mut activity = Vec::new();
    let mut effects = Vec::new();
    let mut is_reassignment = false;

    match action {
        TaskAction::Assign {
            worker_id,
            worker_name,
            date,
            time,
            hours,
        } => {
            validate_assign(worker_id, date, time)?;
            is_reassignment = matches!(
                previous_status,
                TaskStatus::PendingAcceptance | TaskStatus::Accepted | TaskStatus::InProgress
            );

            // Reassignment always resets to pending_acceptance regardless
            // of prior state; at most one active assignment at a time.
            next.status = TaskStatus::PendingAcceptance;
            next.assigned_to = Some(worker_id.clone());
            next.scheduled_date = Some(date.clone());
            next.scheduled_time = Some(time.clone());
            next.duration_hours = Some(*hours);
            next.rejection_reason = None;

            let verb = if is_reassignment { "Reassigned" } else { "Assigned" };
            activity.push(ActivityDraft::new(format!("{verb} to {worker_name}")));
            effects.push(Effect::Notify {
                kind: if is_reassignment {
                    NotificationKind::TaskReassigned
                } else {
                    NotificationKind::TaskAssigned
                },
                worker_id: worker_id.clone(),
            });
        }
        TaskAction::Accept => {
            next.status = TaskStatus::Accepted;
            activity.push(ActivityDraft::new(format!("Confirmed by {actor}")));
        }
        TaskAction::Reject { reason } => {
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(Error::Validation(
                    "rejection requires a reason".to_string(),
                ));
            }
            next.status = TaskStatus::Rejected;
            next.assigned_to = None;
            next.rejection_reason = Some(reason.to_string());
            activity.push(ActivityDraft::new(format!("Rejected by {actor}: {reason}")));
            // Two effects of one command: the thread echoes the reason.
            effects.push(Effect::MessageAppend {
                text: reason.to_string(),
            });
        }
        TaskAction::Start => {
            next.status = TaskStatus::InProgress;
            activity.push(ActivityDraft::new(format!("Started by {actor}")));
        }
        TaskAction::Complete { details } => {
            next.status = TaskStatus::Completed;
            activity.push(ActivityDraft::with_details(
                format!("Completed by {actor}"),
                details.clone(),
            ));
        }
        TaskAction::Edit(edit) => {
            if edit.is_empty() {
                return Err(Error::Validation("edit changes no fields".to_string()));
            }
            for change in edit.apply(&mut next) {
                activity.push(ActivityDraft::new(change.describe()));
            }
        }
    }

    Ok(Transition {
        task: next,
        previous_status,
        activity,
        effects,
        is_reassignment,
    })
}

fn validate_assign(worker_id: &str, date: &str, time: &str) -> Result<()> {
    if worker_id.trim().is_empty() {
        return Err(Error::Validation("assign requires a worker".to_string()));
    }
    if date.trim().is_empty() {
        return Err(Error::Validation("assign requires a date".to_string()));
    }
    if time.trim().is_empty() {
        return Err(Error::Validation("assign requires a time".to_string()));
    }
    Ok(())
}
