//! fieldops export/import command implementation
//!
//! The snapshot boundary: one JSON document holding the project and worker
//! collections. Import replaces both collections wholesale, so re-importing
//! the same snapshot is a no-op. Threads, notifications, and the activity
//! trail stay in place; they are history, not configuration.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Context;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, SCHEMA_VERSION};
use crate::project::Project;
use crate::worker::WorkerRegistry;

#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: String,
    pub exported_at: DateTime<Utc>,
    pub workers: WorkerRegistry,
    pub projects: Vec<Project>,
}

pub fn run_export(ctx: &Context, out: Option<PathBuf>) -> Result<()> {
    let mut projects = ctx.store.list_projects()?;
    projects.sort_by(|a, b| a.id.cmp(&b.id));

    let snapshot = Snapshot {
        schema_version: SCHEMA_VERSION.to_string(),
        exported_at: Utc::now(),
        workers: ctx.store.read_workers()?,
        projects,
    };

    let json = serde_json::to_string_pretty(&snapshot)?;

    match &out {
        Some(path) => {
            std::fs::write(path, json.as_bytes())?;

            #[derive(Serialize)]
            struct ExportReport {
                path: PathBuf,
                projects: usize,
                workers: usize,
            }

            let report = ExportReport {
                path: path.clone(),
                projects: snapshot.projects.len(),
                workers: snapshot.workers.workers.len(),
            };

            let mut human = HumanOutput::new("fieldops export: snapshot written");
            human.push_summary("path", path.display().to_string());
            human.push_summary("projects", report.projects.to_string());
            human.push_summary("workers", report.workers.to_string());

            emit_success(ctx.out, "export", &report, Some(&human))
        }
        None => {
            // The snapshot itself is the output; the envelope would nest it.
            println!("{json}");
            Ok(())
        }
    }
}

pub fn run_import(ctx: &Context, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)?;
    let snapshot: Snapshot = serde_json::from_str(&content)?;

    ctx.store.replace_workers(&snapshot.workers)?;

    // Replace, not merge: projects absent from the snapshot are removed.
    let existing = ctx.store.list_projects()?;
    for project in &existing {
        if !snapshot.projects.iter().any(|p| p.id == project.id) {
            ctx.store.delete_project(&project.id)?;
        }
    }
    for project in &snapshot.projects {
        ctx.store.put_project(project)?;
    }

    #[derive(Serialize)]
    struct ImportReport {
        projects: usize,
        workers: usize,
        removed: usize,
    }

    let removed = existing
        .iter()
        .filter(|project| !snapshot.projects.iter().any(|p| p.id == project.id))
        .count();

    let report = ImportReport {
        projects: snapshot.projects.len(),
        workers: snapshot.workers.workers.len(),
        removed,
    };

    let mut human = HumanOutput::new("fieldops import: collections replaced");
    human.push_summary("projects", report.projects.to_string());
    human.push_summary("workers", report.workers.to_string());
    if removed > 0 {
        human.push_warning(format!("{removed} project(s) not in the snapshot were removed"));
    }

    emit_success(ctx.out, "import", &report, Some(&human))
}
