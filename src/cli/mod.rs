//! Command-line interface for fieldops
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::OutputOptions;
use crate::store::Store;

mod activity;
mod actor;
mod assign;
mod init;
mod msg;
mod notify;
mod project;
mod task;
mod transfer;
mod watch;
mod worker;

/// fieldops - Task coordination for field crews
///
/// A CLI over a shared task store: the office assigns and edits tasks,
/// field workers accept, reject, start, and complete them, and both sides
/// converge through message threads, notifications, and an audit trail.
#[derive(Parser, Debug)]
#[command(name = "fieldops")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the data directory (defaults to the platform data dir)
    #[arg(long, global = true, env = "FIELDOPS_DATA")]
    pub data_dir: Option<PathBuf>,

    /// Actor identity for transitions, messages, and the audit trail
    #[arg(long, global = true, env = "FIELDOPS_ACTOR")]
    pub actor: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the data directory
    Init,

    /// Set or show actor identity
    #[command(subcommand)]
    Actor(ActorCommands),

    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Worker registry management
    #[command(subcommand)]
    Worker(WorkerCommands),

    /// Task lifecycle and editing
    #[command(subcommand)]
    Task(TaskCommands),

    /// Assign tasks to a worker (single, uniform multi-target, or bulk file)
    Assign {
        /// Targets as PROJECT:TASK pairs
        targets: Vec<String>,

        /// Worker id to assign to
        #[arg(short, long)]
        worker: Option<String>,

        /// Scheduled date (e.g. "2025-10-08")
        #[arg(long)]
        date: Option<String>,

        /// Scheduled start time (e.g. "09:00")
        #[arg(long)]
        time: Option<String>,

        /// Estimated duration in hours
        #[arg(long, default_value = "8")]
        hours: f64,

        /// JSON file with an array of assignment tuples
        #[arg(long, conflicts_with_all = ["targets", "worker", "date", "time"])]
        bulk: Option<PathBuf>,

        /// Confirm reassignment of already-assigned tasks
        #[arg(short, long)]
        yes: bool,
    },

    /// Per-task message threads
    #[command(subcommand)]
    Msg(MsgCommands),

    /// Worker notifications
    #[command(subcommand)]
    Notify(NotifyCommands),

    /// Show the activity trail
    Activity {
        /// Filter by project id
        #[arg(long)]
        project: Option<String>,

        /// Filter by task id
        #[arg(long)]
        task: Option<String>,

        /// Filter by the acting user
        #[arg(long)]
        user: Option<String>,

        /// Only entries at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<String>,

        /// Maximum entries to show
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Poll the store and print sync signals as they happen
    Watch {
        /// Sync as this worker's device (tasks + notifications)
        #[arg(short, long)]
        worker: Option<String>,

        /// Office mode: sync tasks for this worker without a device feed
        #[arg(long, conflicts_with = "worker")]
        view_worker: Option<String>,

        /// Keep a thread open, as PROJECT:TASK
        #[arg(long)]
        thread: Option<String>,

        /// Poll interval override (e.g. "2s")
        #[arg(long)]
        interval: Option<String>,

        /// Per-poll timeout override (e.g. "1500ms")
        #[arg(long)]
        timeout: Option<String>,
    },

    /// Export projects and workers as one JSON snapshot
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import a snapshot, replacing projects and workers
    Import {
        /// Snapshot file produced by `fieldops export`
        file: PathBuf,
    },
}

/// Actor subcommands
#[derive(Subcommand, Debug)]
pub enum ActorCommands {
    /// Persist actor identity in the store
    Set {
        /// Actor name
        name: String,
    },

    /// Show the resolved actor
    Show,
}

/// Project subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project
    Add {
        /// Display number (e.g. "2025-014")
        number: String,

        /// Client name
        client: String,

        /// Site address
        #[arg(long)]
        address: Option<String>,

        /// Display color
        #[arg(long)]
        color: Option<String>,
    },

    /// List projects
    List,

    /// Show one project with its tasks
    Show {
        /// Project id
        project_id: String,
    },

    /// Delete a project and the tasks it owns
    Rm {
        /// Project id
        project_id: String,
    },
}

/// Worker subcommands
#[derive(Subcommand, Debug)]
pub enum WorkerCommands {
    /// Register a worker
    Add {
        /// Worker name
        name: String,

        /// Phone number
        #[arg(long)]
        phone: Option<String>,

        /// Skill tags (repeatable)
        #[arg(long = "skill")]
        skills: Vec<String>,

        /// Hourly rate
        #[arg(long)]
        rate: Option<f64>,
    },

    /// List workers
    List,

    /// Remove a worker from the registry
    Rm {
        /// Worker id
        worker_id: String,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Add a task to a project
    Add {
        /// Project id
        project_id: String,

        /// Task description
        description: String,

        /// Billed quantity
        #[arg(long, default_value = "0")]
        quantity: f64,

        /// Unit price
        #[arg(long, default_value = "0")]
        unit_price: f64,

        /// Estimated duration in hours
        #[arg(long)]
        duration: Option<f64>,

        /// Required skill tags (repeatable)
        #[arg(long = "skill")]
        skills: Vec<String>,
    },

    /// List tasks across projects
    List {
        /// Only this project
        #[arg(long)]
        project: Option<String>,

        /// Only tasks assigned to this worker
        #[arg(long)]
        worker: Option<String>,

        /// Only tasks in this status
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one task
    Show {
        /// Project id
        project_id: String,

        /// Task id
        task_id: String,
    },

    /// Accept a pending assignment
    Accept {
        project_id: String,
        task_id: String,
    },

    /// Reject a pending assignment
    Reject {
        project_id: String,
        task_id: String,

        /// Why the assignment is rejected (relayed to the office)
        #[arg(long)]
        reason: String,
    },

    /// Start an accepted task
    Start {
        project_id: String,
        task_id: String,
    },

    /// Complete a task in progress
    Complete {
        project_id: String,
        task_id: String,

        /// Completion notes
        #[arg(long)]
        details: Option<String>,
    },

    /// Edit task fields (office; never changes status)
    Edit {
        project_id: String,
        task_id: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        quantity: Option<f64>,

        #[arg(long)]
        unit_price: Option<f64>,

        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        time: Option<String>,

        #[arg(long)]
        duration: Option<f64>,
    },
}

/// Message thread subcommands
#[derive(Subcommand, Debug)]
pub enum MsgCommands {
    /// Send a message on a task's thread
    Send {
        project_id: String,
        task_id: String,

        /// Message text
        text: String,
    },

    /// List a task's thread
    List {
        project_id: String,
        task_id: String,
    },

    /// Mark the other participant's messages as read
    Read {
        project_id: String,
        task_id: String,
    },
}

/// Notification subcommands
#[derive(Subcommand, Debug)]
pub enum NotifyCommands {
    /// List notifications for a worker, newest first
    List {
        /// Worker id
        worker_id: String,

        /// Only unread notifications
        #[arg(long)]
        unread: bool,
    },

    /// Mark all of a worker's notifications as read
    Read {
        /// Worker id
        worker_id: String,
    },
}

/// Shared per-command context: an opened store, loaded config, resolved
/// actor, and output options.
pub(crate) struct Context {
    pub store: Store,
    pub config: Config,
    pub actor: String,
    pub out: OutputOptions,
}

impl Context {
    fn open(
        data_dir: Option<PathBuf>,
        actor: Option<String>,
        json: bool,
        quiet: bool,
    ) -> Result<Self> {
        let dir = resolve_data_dir(data_dir)?;
        let store = Store::open(dir)?;
        let config = Config::load_from_dir(store.data_dir());
        let actor = resolve_actor(&store, actor.as_deref(), &config);
        Ok(Self {
            store,
            config,
            actor,
            out: OutputOptions { json, quiet },
        })
    }
}

/// Resolve the data directory: explicit flag (or `FIELDOPS_DATA` via clap),
/// then the platform data dir.
pub fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    directories::ProjectDirs::from("", "", "fieldops")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            Error::OperationFailed(
                "could not determine a data directory; pass --data-dir".to_string(),
            )
        })
}

/// Resolve the actor: flag (or `FIELDOPS_ACTOR` via clap), then the
/// persisted `actor` file, then the config default.
pub fn resolve_actor(store: &Store, flag: Option<&str>, config: &Config) -> String {
    flag.map(str::to_string)
        .or_else(|| store.read_actor())
        .unwrap_or_else(|| config.actor.default.clone())
}

/// Split a "PROJECT:TASK" target.
pub(crate) fn parse_target(target: &str) -> Result<(String, String)> {
    match target.split_once(':') {
        Some((project, task)) if !project.is_empty() && !task.is_empty() => {
            Ok((project.to_string(), task.to_string()))
        }
        _ => Err(Error::InvalidArgument(format!(
            "invalid target '{target}': expected PROJECT:TASK"
        ))),
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let json = self.json;
        let quiet = self.quiet;

        match self.command {
            Commands::Init => init::run(self.data_dir, json, quiet),
            Commands::Actor(cmd) => {
                let ctx = Context::open(self.data_dir, self.actor, json, quiet)?;
                match cmd {
                    ActorCommands::Set { name } => actor::run_set(&ctx, &name),
                    ActorCommands::Show => actor::run_show(&ctx),
                }
            }
            Commands::Project(cmd) => {
                let ctx = Context::open(self.data_dir, self.actor, json, quiet)?;
                match cmd {
                    ProjectCommands::Add {
                        number,
                        client,
                        address,
                        color,
                    } => project::run_add(&ctx, project::AddOptions {
                        number,
                        client,
                        address,
                        color,
                    }),
                    ProjectCommands::List => project::run_list(&ctx),
                    ProjectCommands::Show { project_id } => project::run_show(&ctx, &project_id),
                    ProjectCommands::Rm { project_id } => project::run_rm(&ctx, &project_id),
                }
            }
            Commands::Worker(cmd) => {
                let ctx = Context::open(self.data_dir, self.actor, json, quiet)?;
                match cmd {
                    WorkerCommands::Add {
                        name,
                        phone,
                        skills,
                        rate,
                    } => worker::run_add(&ctx, worker::AddOptions {
                        name,
                        phone,
                        skills,
                        rate,
                    }),
                    WorkerCommands::List => worker::run_list(&ctx),
                    WorkerCommands::Rm { worker_id } => worker::run_rm(&ctx, &worker_id),
                }
            }
            Commands::Task(cmd) => {
                let ctx = Context::open(self.data_dir, self.actor, json, quiet)?;
                task::run(&ctx, cmd)
            }
            Commands::Assign {
                targets,
                worker,
                date,
                time,
                hours,
                bulk,
                yes,
            } => {
                let ctx = Context::open(self.data_dir, self.actor, json, quiet)?;
                assign::run(&ctx, assign::AssignOptions {
                    targets,
                    worker,
                    date,
                    time,
                    hours,
                    bulk,
                    yes,
                })
            }
            Commands::Msg(cmd) => {
                let ctx = Context::open(self.data_dir, self.actor, json, quiet)?;
                match cmd {
                    MsgCommands::Send {
                        project_id,
                        task_id,
                        text,
                    } => msg::run_send(&ctx, &project_id, &task_id, &text),
                    MsgCommands::List {
                        project_id,
                        task_id,
                    } => msg::run_list(&ctx, &project_id, &task_id),
                    MsgCommands::Read {
                        project_id,
                        task_id,
                    } => msg::run_read(&ctx, &project_id, &task_id),
                }
            }
            Commands::Notify(cmd) => {
                let ctx = Context::open(self.data_dir, self.actor, json, quiet)?;
                match cmd {
                    NotifyCommands::List { worker_id, unread } => {
                        notify::run_list(&ctx, &worker_id, unread)
                    }
                    NotifyCommands::Read { worker_id } => notify::run_read(&ctx, &worker_id),
                }
            }
            Commands::Activity {
                project,
                task,
                user,
                since,
                limit,
            } => {
                let ctx = Context::open(self.data_dir, self.actor, json, quiet)?;
                activity::run(&ctx, activity::ActivityOptions {
                    project,
                    task,
                    user,
                    since,
                    limit,
                })
            }
            Commands::Watch {
                worker,
                view_worker,
                thread,
                interval,
                timeout,
            } => {
                let ctx = Context::open(self.data_dir, self.actor, json, quiet)?;
                watch::run(&ctx, watch::WatchOptions {
                    worker,
                    view_worker,
                    thread,
                    interval,
                    timeout,
                })
            }
            Commands::Export { out } => {
                let ctx = Context::open(self.data_dir, self.actor, json, quiet)?;
                transfer::run_export(&ctx, out)
            }
            Commands::Import { file } => {
                let ctx = Context::open(self.data_dir, self.actor, json, quiet)?;
                transfer::run_import(&ctx, &file)
            }
        }
    }
}
