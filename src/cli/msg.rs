//! fieldops msg command implementation
//!
//! Per-task message threads. Reading a thread does not mark anything; the
//! explicit `read` subcommand flips the other participant's messages.

use super::Context;
use crate::error::Result;
use crate::messages::{unread_count, MessageThreads, ThreadKey};
use crate::output::{emit_success, HumanOutput};

pub fn run_send(ctx: &Context, project_id: &str, task_id: &str, text: &str) -> Result<()> {
    // Fail on a dangling thread key before appending.
    ctx.store.read_task(project_id, task_id)?;

    let threads = MessageThreads::new(ctx.store.clone());
    let key = ThreadKey::new(project_id, task_id);
    let message = threads.send(&key, &ctx.actor, text)?;

    let mut human = HumanOutput::new(format!("fieldops msg send: {}", message.id));
    human.push_summary("thread", format!("{project_id}:{task_id}"));
    human.push_summary("sender", message.sender.clone());

    emit_success(ctx.out, "msg send", &message, Some(&human))
}

pub fn run_list(ctx: &Context, project_id: &str, task_id: &str) -> Result<()> {
    let threads = MessageThreads::new(ctx.store.clone());
    let key = ThreadKey::new(project_id, task_id);
    let messages = threads.messages(&key)?;
    let unread = unread_count(&messages, &ctx.actor);

    #[derive(serde::Serialize)]
    struct ListReport {
        messages: Vec<crate::messages::Message>,
        unread: usize,
    }

    let mut human = HumanOutput::new(format!(
        "fieldops msg list: {} message(s), {unread} unread",
        messages.len()
    ));
    for message in &messages {
        let marker = if message.read { " " } else { "*" };
        human.push_detail(format!(
            "{marker} {} {}: {}",
            message.timestamp.format("%Y-%m-%d %H:%M"),
            message.sender,
            message.text
        ));
    }
    if unread > 0 {
        human.push_next_step(format!("fieldops msg read {project_id} {task_id}"));
    }

    emit_success(
        ctx.out,
        "msg list",
        &ListReport { messages, unread },
        Some(&human),
    )
}

pub fn run_read(ctx: &Context, project_id: &str, task_id: &str) -> Result<()> {
    let threads = MessageThreads::new(ctx.store.clone());
    let key = ThreadKey::new(project_id, task_id);
    let marked = threads.mark_read(&key, &ctx.actor)?;

    #[derive(serde::Serialize)]
    struct ReadReport {
        marked: usize,
    }

    let mut human = HumanOutput::new(format!("fieldops msg read: {marked} marked"));
    human.push_summary("thread", format!("{project_id}:{task_id}"));
    human.push_summary("reader", ctx.actor.clone());

    emit_success(ctx.out, "msg read", &ReadReport { marked }, Some(&human))
}
