//! fieldops assign command implementation
//!
//! One command covers single assignment, the uniform "same worker and
//! schedule for every target" convenience, and bulk tuples from a JSON
//! file. Everything is expanded to per-task tuples before the engine runs.

use std::path::PathBuf;

use super::{parse_target, Context};
use crate::assign::{AssignRequest, Engine};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};

pub struct AssignOptions {
    pub targets: Vec<String>,
    pub worker: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub hours: f64,
    pub bulk: Option<PathBuf>,
    pub yes: bool,
}

pub fn run(ctx: &Context, options: AssignOptions) -> Result<()> {
    let requests = build_requests(&options)?;
    let engine = Engine::new(ctx.store.clone());

    // A single tuple keeps full error fidelity (exit codes for stale state
    // and the reassignment gate); a batch reports per tuple instead.
    if let [request] = requests.as_slice() {
        let task = engine.assign(request, &ctx.actor, options.yes)?;

        let workers = ctx.store.read_workers()?;
        let mut human = HumanOutput::new(format!("fieldops assign: {}", request.task_id));
        human.push_summary("worker", workers.display_name(&request.worker_id));
        human.push_summary("status", task.status.to_string());
        human.push_summary(
            "scheduled",
            format!("{} {} ({}h)", request.date, request.time, request.hours),
        );

        return emit_success(ctx.out, "assign", &task, Some(&human));
    }

    let report = engine.assign_bulk(&requests, &ctx.actor, options.yes);

    let mut human = HumanOutput::new(format!(
        "fieldops assign: {} of {} task(s) assigned",
        report.succeeded.len(),
        requests.len()
    ));
    for success in &report.succeeded {
        human.push_detail(format!("{}:{} assigned", success.project_id, success.task_id));
    }
    for failure in &report.failed {
        human.push_warning(format!(
            "{}:{} failed: {}",
            failure.project_id, failure.task_id, failure.error
        ));
    }
    if !report.all_succeeded() {
        human.push_next_step("re-run failed targets individually for full error detail");
    }

    if report.succeeded.is_empty() && !report.failed.is_empty() {
        // Emit the report first so the caller sees per-tuple reasons.
        emit_success(ctx.out, "assign", &report, Some(&human))?;
        return Err(Error::OperationFailed(
            "no assignments succeeded".to_string(),
        ));
    }

    emit_success(ctx.out, "assign", &report, Some(&human))
}

fn build_requests(options: &AssignOptions) -> Result<Vec<AssignRequest>> {
    if let Some(path) = &options.bulk {
        let content = std::fs::read_to_string(path)?;
        let requests: Vec<AssignRequest> = serde_json::from_str(&content)?;
        if requests.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "bulk file {} contains no assignments",
                path.display()
            )));
        }
        return Ok(requests);
    }

    if options.targets.is_empty() {
        return Err(Error::InvalidArgument(
            "pass at least one PROJECT:TASK target or --bulk <file>".to_string(),
        ));
    }

    let worker = options
        .worker
        .as_deref()
        .ok_or_else(|| Error::InvalidArgument("--worker is required".to_string()))?;
    let date = options
        .date
        .as_deref()
        .ok_or_else(|| Error::InvalidArgument("--date is required".to_string()))?;
    let time = options
        .time
        .as_deref()
        .ok_or_else(|| Error::InvalidArgument("--time is required".to_string()))?;

    let targets = options
        .targets
        .iter()
        .map(|target| parse_target(target))
        .collect::<Result<Vec<_>>>()?;

    Ok(AssignRequest::uniform(
        &targets,
        worker,
        date,
        time,
        options.hours,
    ))
}
