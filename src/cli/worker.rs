//! fieldops worker command implementation

use super::Context;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::worker::Worker;

pub struct AddOptions {
    pub name: String,
    pub phone: Option<String>,
    pub skills: Vec<String>,
    pub rate: Option<f64>,
}

pub fn run_add(ctx: &Context, options: AddOptions) -> Result<()> {
    let name = options.name.trim();
    if name.is_empty() {
        return Err(Error::Validation("worker name cannot be empty".to_string()));
    }

    let mut worker = Worker::new(name);
    worker.phone = options.phone;
    worker.skills = options.skills.into_iter().collect();
    worker.hourly_rate = options.rate;

    let added = worker.clone();
    ctx.store.update_workers(|registry| registry.insert(worker))?;

    let mut human = HumanOutput::new(format!("fieldops worker add: {}", added.name));
    human.push_summary("id", added.id.clone());
    if !added.skills.is_empty() {
        human.push_summary(
            "skills",
            added.skills.iter().cloned().collect::<Vec<_>>().join(", "),
        );
    }

    emit_success(ctx.out, "worker add", &added, Some(&human))
}

pub fn run_list(ctx: &Context) -> Result<()> {
    let registry = ctx.store.read_workers()?;

    let mut human = HumanOutput::new(format!("fieldops workers: {}", registry.workers.len()));
    for worker in &registry.workers {
        let skills = if worker.skills.is_empty() {
            String::new()
        } else {
            format!(
                " [{}]",
                worker.skills.iter().cloned().collect::<Vec<_>>().join(", ")
            )
        };
        human.push_detail(format!("{} {}{skills}", worker.id, worker.name));
    }

    emit_success(ctx.out, "worker list", &registry, Some(&human))
}

pub fn run_rm(ctx: &Context, worker_id: &str) -> Result<()> {
    let removed = ctx.store.update_workers(|registry| {
        registry
            .remove(worker_id)
            .ok_or_else(|| Error::WorkerNotFound(worker_id.to_string()))
    })?;

    // Assignments keep the id as a weak reference; flag any left behind.
    let dangling = ctx.store.tasks_for_worker(worker_id)?;

    let mut human = HumanOutput::new(format!("fieldops worker rm: {}", removed.name));
    human.push_summary("id", removed.id.clone());
    if !dangling.is_empty() {
        human.push_warning(format!(
            "{} task(s) still reference this worker",
            dangling.len()
        ));
        human.push_next_step("fieldops assign <PROJECT:TASK> --worker <id> --date ... --yes");
    }

    emit_success(ctx.out, "worker rm", &removed, Some(&human))
}
