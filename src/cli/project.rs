//! fieldops project command implementation

use super::Context;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::project::Project;

pub struct AddOptions {
    pub number: String,
    pub client: String,
    pub address: Option<String>,
    pub color: Option<String>,
}

#[derive(serde::Serialize)]
struct ProjectListReport {
    projects: Vec<ProjectRow>,
}

#[derive(serde::Serialize)]
struct ProjectRow {
    id: String,
    number: String,
    client: String,
    tasks: usize,
}

pub fn run_add(ctx: &Context, options: AddOptions) -> Result<()> {
    let mut project = Project::new(options.number, options.client);
    project.address = options.address;
    project.color = options.color;
    ctx.store.put_project(&project)?;

    let mut human = HumanOutput::new(format!(
        "fieldops project add: {} ({})",
        project.number, project.client
    ));
    human.push_summary("id", project.id.clone());
    human.push_next_step(format!("fieldops task add {} <description>", project.id));

    emit_success(ctx.out, "project add", &project, Some(&human))
}

pub fn run_list(ctx: &Context) -> Result<()> {
    let mut projects = ctx.store.list_projects()?;
    projects.sort_by(|a, b| a.number.cmp(&b.number));

    let report = ProjectListReport {
        projects: projects
            .iter()
            .map(|project| ProjectRow {
                id: project.id.clone(),
                number: project.number.clone(),
                client: project.client.clone(),
                tasks: project.tasks.len(),
            })
            .collect(),
    };

    let mut human = HumanOutput::new(format!("fieldops projects: {}", projects.len()));
    for project in &projects {
        human.push_detail(format!(
            "{} {} ({}) - {} task(s)",
            project.id,
            project.number,
            project.client,
            project.tasks.len()
        ));
    }

    emit_success(ctx.out, "project list", &report, Some(&human))
}

pub fn run_show(ctx: &Context, project_id: &str) -> Result<()> {
    let project = ctx.store.read_project(project_id)?;
    let workers = ctx.store.read_workers()?;

    let mut human = HumanOutput::new(format!(
        "fieldops project: {} ({})",
        project.number, project.client
    ));
    human.push_summary("id", project.id.clone());
    if let Some(address) = &project.address {
        human.push_summary("address", address.clone());
    }
    human.push_summary("tasks", project.tasks.len().to_string());
    for task in &project.tasks {
        let assignee = task
            .assigned_to
            .as_deref()
            .map(|id| workers.display_name(id))
            .unwrap_or_else(|| "-".to_string());
        human.push_detail(format!(
            "{} [{}] {} (assignee: {assignee})",
            task.id, task.status, task.description
        ));
    }

    emit_success(ctx.out, "project show", &project, Some(&human))
}

pub fn run_rm(ctx: &Context, project_id: &str) -> Result<()> {
    // Surface NotFound before deleting.
    let project = ctx.store.read_project(project_id)?;
    ctx.store.delete_project(project_id)?;

    let mut human = HumanOutput::new(format!("fieldops project rm: {}", project.number));
    human.push_summary("id", project.id.clone());
    human.push_summary("tasks removed", project.tasks.len().to_string());

    #[derive(serde::Serialize)]
    struct RmReport {
        id: String,
        tasks_removed: usize,
    }

    let report = RmReport {
        id: project.id.clone(),
        tasks_removed: project.tasks.len(),
    };

    emit_success(ctx.out, "project rm", &report, Some(&human))
}
