//! Project model: a client engagement that owns an ordered list of tasks.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::task::Task;

/// A client engagement. Sole owner of its tasks; deleting a project is
/// assumed by callers to remove them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    /// Display key. Unique in practice but not enforced across the store.
    pub number: String,
    pub client: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Presentation only; ignored by all core logic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Project {
    pub fn new(number: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string().to_lowercase(),
            number: number.into(),
            client: client.into(),
            address: None,
            color: None,
            tasks: Vec::new(),
        }
    }

    pub fn task(&self, task_id: &str) -> Result<&Task> {
        self.tasks
            .iter()
            .find(|task| task.id == task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
    }

    pub fn task_mut(&mut self, task_id: &str) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
    }

    /// Push a new task, stamping its owning project id.
    pub fn add_task(&mut self, mut task: Task) -> String {
        task.project_id = self.id.clone();
        let id = task.id.clone();
        self.tasks.push(task);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_task_stamps_project_id() {
        let mut project = Project::new("2025-014", "Meridian Logistics");
        let task = Task::new("placeholder", "Fit door closers");
        let task_id = project.add_task(task);
        let task = project.task(&task_id).unwrap();
        assert_eq!(task.project_id, project.id);
    }

    #[test]
    fn missing_task_is_not_found() {
        let project = Project::new("2025-014", "Meridian Logistics");
        assert!(matches!(
            project.task("nope"),
            Err(Error::TaskNotFound(_))
        ));
    }
}
