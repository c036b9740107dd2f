//! fieldops task command implementation
//!
//! Task creation, listing, and the worker-side lifecycle transitions. All
//! transitions go through the engine so the stale-state guard, effects, and
//! audit trail apply uniformly.

use super::{Context, TaskCommands};
use crate::assign::Engine;
use crate::error::{Error, Result};
use crate::lifecycle::TaskAction;
use crate::output::{emit_success, HumanOutput};
use crate::task::{Task, TaskEdit, TaskStatus};

pub fn run(ctx: &Context, command: TaskCommands) -> Result<()> {
    match command {
        TaskCommands::Add {
            project_id,
            description,
            quantity,
            unit_price,
            duration,
            skills,
        } => run_add(ctx, project_id, description, quantity, unit_price, duration, skills),
        TaskCommands::List {
            project,
            worker,
            status,
        } => run_list(ctx, project, worker, status),
        TaskCommands::Show {
            project_id,
            task_id,
        } => run_show(ctx, &project_id, &task_id),
        TaskCommands::Accept {
            project_id,
            task_id,
        } => run_transition(ctx, &project_id, &task_id, TaskAction::Accept),
        TaskCommands::Reject {
            project_id,
            task_id,
            reason,
        } => run_transition(ctx, &project_id, &task_id, TaskAction::Reject { reason }),
        TaskCommands::Start {
            project_id,
            task_id,
        } => run_transition(ctx, &project_id, &task_id, TaskAction::Start),
        TaskCommands::Complete {
            project_id,
            task_id,
            details,
        } => run_transition(ctx, &project_id, &task_id, TaskAction::Complete { details }),
        TaskCommands::Edit {
            project_id,
            task_id,
            description,
            quantity,
            unit_price,
            date,
            time,
            duration,
        } => run_edit(
            ctx,
            &project_id,
            &task_id,
            TaskEdit {
                description,
                quantity,
                unit_price,
                scheduled_date: date,
                scheduled_time: time,
                duration_hours: duration,
            },
        ),
    }
}

fn run_add(
    ctx: &Context,
    project_id: String,
    description: String,
    quantity: f64,
    unit_price: f64,
    duration: Option<f64>,
    skills: Vec<String>,
) -> Result<()> {
    if description.trim().is_empty() {
        return Err(Error::Validation("task description cannot be empty".to_string()));
    }

    let task_id = ctx.store.update_project(&project_id, |project| {
        let mut task = Task::new("", description.clone());
        task.quantity = quantity;
        task.unit_price = unit_price;
        task.duration_hours = duration;
        task.required_skills = skills.iter().cloned().collect();
        task.recompute_amount();
        Ok(project.add_task(task))
    })?;

    let task = ctx.store.read_task(&project_id, &task_id)?;

    let mut human = HumanOutput::new(format!("fieldops task add: {task_id}"));
    human.push_summary("project", project_id.clone());
    human.push_summary("status", task.status.to_string());
    human.push_next_step(format!(
        "fieldops assign {project_id}:{task_id} --worker <id> --date <date> --time <time>"
    ));

    emit_success(ctx.out, "task add", &task, Some(&human))
}

fn run_list(
    ctx: &Context,
    project: Option<String>,
    worker: Option<String>,
    status: Option<String>,
) -> Result<()> {
    let status = match status.as_deref() {
        Some(raw) => Some(TaskStatus::parse(raw).ok_or_else(|| {
            Error::InvalidArgument(format!("unknown status '{raw}'"))
        })?),
        None => None,
    };

    let mut tasks: Vec<Task> = match &project {
        Some(project_id) => ctx.store.read_project(project_id)?.tasks,
        None => {
            let mut tasks = Vec::new();
            for project in ctx.store.list_projects()? {
                tasks.extend(project.tasks);
            }
            tasks
        }
    };
    if let Some(worker_id) = &worker {
        tasks.retain(|task| task.assigned_to.as_deref() == Some(worker_id.as_str()));
    }
    if let Some(status) = status {
        tasks.retain(|task| task.status == status);
    }

    let workers = ctx.store.read_workers()?;

    #[derive(serde::Serialize)]
    struct ListReport {
        tasks: Vec<Task>,
    }

    let mut human = HumanOutput::new(format!("fieldops tasks: {}", tasks.len()));
    for task in &tasks {
        let assignee = task
            .assigned_to
            .as_deref()
            .map(|id| workers.display_name(id))
            .unwrap_or_else(|| "-".to_string());
        human.push_detail(format!(
            "{}:{} [{}] {} (assignee: {assignee})",
            task.project_id, task.id, task.status, task.description
        ));
    }

    emit_success(ctx.out, "task list", &ListReport { tasks }, Some(&human))
}

fn run_show(ctx: &Context, project_id: &str, task_id: &str) -> Result<()> {
    let task = ctx.store.read_task(project_id, task_id)?;
    let workers = ctx.store.read_workers()?;

    let mut human = HumanOutput::new(format!("fieldops task: {}", task.id));
    human.push_summary("description", task.description.clone());
    human.push_summary("status", task.status.to_string());
    if let Some(worker_id) = &task.assigned_to {
        human.push_summary("assignee", workers.display_name(worker_id));
    }
    if let Some(date) = &task.scheduled_date {
        let time = task.scheduled_time.as_deref().unwrap_or("-");
        human.push_summary("scheduled", format!("{date} {time}"));
    }
    human.push_summary("amount", format!("{:.2}", task.amount));
    if let Some(reason) = &task.rejection_reason {
        human.push_warning(format!("last rejection: {reason}"));
    }

    emit_success(ctx.out, "task show", &task, Some(&human))
}

fn run_transition(
    ctx: &Context,
    project_id: &str,
    task_id: &str,
    action: TaskAction,
) -> Result<()> {
    let engine = Engine::new(ctx.store.clone());
    let name = action.name();
    let task = engine.transition(project_id, task_id, &action, &ctx.actor)?;

    let mut human = HumanOutput::new(format!("fieldops task {name}: {task_id}"));
    human.push_summary("status", task.status.to_string());
    human.push_summary("actor", ctx.actor.clone());

    emit_success(ctx.out, &format!("task {name}"), &task, Some(&human))
}

fn run_edit(ctx: &Context, project_id: &str, task_id: &str, edit: TaskEdit) -> Result<()> {
    if edit.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to edit: pass at least one field flag".to_string(),
        ));
    }

    let engine = Engine::new(ctx.store.clone());
    let task = engine.edit(project_id, task_id, edit, &ctx.actor)?;

    let mut human = HumanOutput::new(format!("fieldops task edit: {task_id}"));
    human.push_summary("status", task.status.to_string());
    human.push_summary("amount", format!("{:.2}", task.amount));

    emit_success(ctx.out, "task edit", &task, Some(&human))
}
