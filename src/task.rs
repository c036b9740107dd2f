//! Task model: the unit of assignable work, owned by a project.
//!
//! A task's message thread and activity trail live in their own stores keyed
//! by (project, task); the task document itself only carries lifecycle and
//! billing fields.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Lifecycle status of a task.
///
/// `Accepted` is the canonical "confirmed, not yet started" state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Unassigned,
    PendingAcceptance,
    Accepted,
    Rejected,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Unassigned => "unassigned",
            TaskStatus::PendingAcceptance => "pending_acceptance",
            TaskStatus::Accepted => "accepted",
            TaskStatus::Rejected => "rejected",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s.trim() {
            "unassigned" => Some(TaskStatus::Unassigned),
            "pending_acceptance" => Some(TaskStatus::PendingAcceptance),
            "accepted" => Some(TaskStatus::Accepted),
            "rejected" => Some(TaskStatus::Rejected),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A material line item on a task. Opaque to the lifecycle; carried for the
/// office's billing view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Material {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
}

/// The unit of assignable work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub description: String,
    pub status: TaskStatus,
    /// Worker id; present iff status is not `unassigned`/`rejected`.
    /// Always a weak reference, resolved by lookup at read time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
    pub quantity: f64,
    pub unit_price: f64,
    /// Always quantity * unit_price; recomputed on edit.
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub required_skills: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl Task {
    pub fn new(project_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string().to_lowercase(),
            project_id: project_id.into(),
            description: description.into(),
            status: TaskStatus::Unassigned,
            assigned_to: None,
            scheduled_date: None,
            scheduled_time: None,
            duration_hours: None,
            quantity: 0.0,
            unit_price: 0.0,
            amount: 0.0,
            materials: Vec::new(),
            required_skills: BTreeSet::new(),
            rejection_reason: None,
        }
    }

    /// Recompute the derived amount from quantity and unit price.
    pub fn recompute_amount(&mut self) {
        self.amount = self.quantity * self.unit_price;
    }
}

/// A partial edit applied by the office. Allowed in any status; never
/// changes the status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
}

/// One changed field, phrased for the activity trail.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub old: String,
    pub new: String,
}

impl FieldChange {
    pub fn describe(&self) -> String {
        format!("Changed {} from {} to {}", self.field, self.old, self.new)
    }
}

impl TaskEdit {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.quantity.is_none()
            && self.unit_price.is_none()
            && self.scheduled_date.is_none()
            && self.scheduled_time.is_none()
            && self.duration_hours.is_none()
    }

    /// Apply the edit, returning one change record per field that actually
    /// changed. The derived amount is recomputed whenever quantity or unit
    /// price change.
    pub fn apply(&self, task: &mut Task) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        if let Some(description) = &self.description {
            if description != &task.description {
                changes.push(FieldChange {
                    field: "description".to_string(),
                    old: task.description.clone(),
                    new: description.clone(),
                });
                task.description = description.clone();
            }
        }

        if let Some(quantity) = self.quantity {
            if quantity != task.quantity {
                changes.push(FieldChange {
                    field: "quantity".to_string(),
                    old: format_number(task.quantity),
                    new: format_number(quantity),
                });
                task.quantity = quantity;
            }
        }

        if let Some(unit_price) = self.unit_price {
            if unit_price != task.unit_price {
                changes.push(FieldChange {
                    field: "unit_price".to_string(),
                    old: format_number(task.unit_price),
                    new: format_number(unit_price),
                });
                task.unit_price = unit_price;
            }
        }

        if let Some(date) = &self.scheduled_date {
            if Some(date.as_str()) != task.scheduled_date.as_deref() {
                changes.push(FieldChange {
                    field: "scheduled_date".to_string(),
                    old: task.scheduled_date.clone().unwrap_or_else(|| "-".to_string()),
                    new: date.clone(),
                });
                task.scheduled_date = Some(date.clone());
            }
        }

        if let Some(time) = &self.scheduled_time {
            if Some(time.as_str()) != task.scheduled_time.as_deref() {
                changes.push(FieldChange {
                    field: "scheduled_time".to_string(),
                    old: task.scheduled_time.clone().unwrap_or_else(|| "-".to_string()),
                    new: time.clone(),
                });
                task.scheduled_time = Some(time.clone());
            }
        }

        if let Some(hours) = self.duration_hours {
            if Some(hours) != task.duration_hours {
                changes.push(FieldChange {
                    field: "duration_hours".to_string(),
                    old: task
                        .duration_hours
                        .map(format_number)
                        .unwrap_or_else(|| "-".to_string()),
                    new: format_number(hours),
                });
                task.duration_hours = Some(hours);
            }
        }

        task.recompute_amount();
        changes
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            TaskStatus::Unassigned,
            TaskStatus::PendingAcceptance,
            TaskStatus::Accepted,
            TaskStatus::Rejected,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("paused"), None);
    }

    #[test]
    fn edit_recomputes_amount() {
        let mut task = Task::new("proj-1", "Install panels");
        task.quantity = 4.0;
        task.unit_price = 25.0;
        task.recompute_amount();
        assert_eq!(task.amount, 100.0);

        let edit = TaskEdit {
            quantity: Some(6.0),
            ..TaskEdit::default()
        };
        let changes = edit.apply(&mut task);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].describe(), "Changed quantity from 4 to 6");
        assert_eq!(task.amount, 150.0);
    }

    #[test]
    fn edit_with_zero_price_keeps_invariant() {
        let mut task = Task::new("proj-1", "Survey");
        task.quantity = 3.0;
        task.unit_price = 10.0;
        task.recompute_amount();

        let edit = TaskEdit {
            unit_price: Some(0.0),
            ..TaskEdit::default()
        };
        edit.apply(&mut task);
        assert_eq!(task.amount, task.quantity * task.unit_price);
        assert_eq!(task.amount, 0.0);
    }

    #[test]
    fn edit_emits_one_change_per_field() {
        let mut task = Task::new("proj-1", "Trenching");
        let edit = TaskEdit {
            description: Some("Trenching north side".to_string()),
            quantity: Some(2.0),
            scheduled_date: Some("2025-10-08".to_string()),
            ..TaskEdit::default()
        };
        let changes = edit.apply(&mut task);
        assert_eq!(changes.len(), 3);
        let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["description", "quantity", "scheduled_date"]);
    }

    #[test]
    fn unchanged_fields_emit_no_changes() {
        let mut task = Task::new("proj-1", "Cabling");
        task.quantity = 5.0;
        task.recompute_amount();
        let edit = TaskEdit {
            quantity: Some(5.0),
            ..TaskEdit::default()
        };
        assert!(edit.apply(&mut task).is_empty());
    }
}
