//! fieldops actor command implementation
//!
//! Persist or show the actor identity used for transitions and messages.

use std::path::PathBuf;

use super::Context;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct ActorSetReport {
    actor: String,
    path: PathBuf,
}

#[derive(serde::Serialize)]
struct ActorShowReport {
    actor: String,
}

pub fn run_set(ctx: &Context, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidArgument("actor name cannot be empty".to_string()));
    }

    ctx.store.write_actor(name)?;
    let path = ctx.store.data_dir().join("actor");

    let report = ActorSetReport {
        actor: name.to_string(),
        path: path.clone(),
    };

    let mut human = HumanOutput::new(format!("fieldops actor set: {name}"));
    human.push_summary("actor", name);
    human.push_summary("path", path.display().to_string());

    emit_success(ctx.out, "actor set", &report, Some(&human))
}

pub fn run_show(ctx: &Context) -> Result<()> {
    let report = ActorShowReport {
        actor: ctx.actor.clone(),
    };

    let mut human = HumanOutput::new(format!("fieldops actor: {}", ctx.actor));
    human.push_summary("actor", ctx.actor.clone());
    if ctx.store.read_actor().is_none() {
        human.push_warning("actor not persisted; using flag, env, or config default");
        human.push_next_step("fieldops actor set <name>");
    }

    emit_success(ctx.out, "actor show", &report, Some(&human))
}
