//! fieldops notify command implementation

use super::Context;
use crate::error::Result;
use crate::notify::{Notification, NotificationDispatcher, NotificationKind};
use crate::output::{emit_success, HumanOutput};

pub fn run_list(ctx: &Context, worker_id: &str, unread_only: bool) -> Result<()> {
    // Surface a bad id instead of an empty feed.
    ctx.store.read_workers()?.require(worker_id)?;

    let dispatcher = NotificationDispatcher::new(ctx.store.clone());
    let mut notifications = dispatcher.list_for(worker_id)?;
    if unread_only {
        notifications.retain(|n| !n.read);
    }
    let unread = notifications.iter().filter(|n| !n.read).count();

    #[derive(serde::Serialize)]
    struct ListReport {
        notifications: Vec<Notification>,
        unread: usize,
    }

    let mut human = HumanOutput::new(format!(
        "fieldops notifications: {} shown, {unread} unread",
        notifications.len()
    ));
    for notification in &notifications {
        let marker = if notification.read { " " } else { "*" };
        let what = match notification.kind {
            NotificationKind::TaskAssigned => "task assigned",
            NotificationKind::TaskReassigned => "task reassigned",
        };
        let target = match (&notification.project_id, &notification.task_id) {
            (Some(project), Some(task)) => format!(" ({project}:{task})"),
            _ => String::new(),
        };
        human.push_detail(format!(
            "{marker} {} {what}{target}",
            notification.created_at.format("%Y-%m-%d %H:%M")
        ));
    }
    if unread > 0 {
        human.push_next_step(format!("fieldops notify read {worker_id}"));
    }

    emit_success(
        ctx.out,
        "notify list",
        &ListReport {
            notifications,
            unread,
        },
        Some(&human),
    )
}

pub fn run_read(ctx: &Context, worker_id: &str) -> Result<()> {
    ctx.store.read_workers()?.require(worker_id)?;

    let dispatcher = NotificationDispatcher::new(ctx.store.clone());
    let marked = dispatcher.mark_read(worker_id)?;

    #[derive(serde::Serialize)]
    struct ReadReport {
        marked: usize,
    }

    let mut human = HumanOutput::new(format!("fieldops notify read: {marked} marked"));
    human.push_summary("worker", worker_id);

    emit_success(ctx.out, "notify read", &ReadReport { marked }, Some(&human))
}
