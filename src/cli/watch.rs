//! fieldops watch command implementation
//!
//! Runs the polling reconciler against the store and prints sync signals
//! until interrupted. This is the CLI stand-in for a device screen: a
//! worker mode (own tasks + notifications) and an office mode (tasks of a
//! viewed worker), optionally holding one thread open.

use std::sync::{Arc, Mutex};

use super::Context;
use crate::config::parse_duration;
use crate::error::Result;
use crate::messages::ThreadKey;
use crate::poll::{Poller, StoreSyncSource};
use crate::reconcile::{SyncScope, SyncSignal, ViewState};

pub struct WatchOptions {
    pub worker: Option<String>,
    pub view_worker: Option<String>,
    pub thread: Option<String>,
    pub interval: Option<String>,
    pub timeout: Option<String>,
}

pub fn run(ctx: &Context, options: WatchOptions) -> Result<()> {
    let open_thread = match options.thread.as_deref() {
        Some(target) => {
            let (project_id, task_id) = super::parse_target(target)?;
            Some(ThreadKey::new(project_id, task_id))
        }
        None => None,
    };

    // The viewer name drives the "own messages never signal" rule.
    let viewer = match options.worker.as_deref() {
        Some(worker_id) => ctx.store.read_workers()?.require(worker_id)?.name.clone(),
        None => ctx.actor.clone(),
    };

    let scope = SyncScope {
        worker_id: options.worker.clone(),
        viewed_worker_id: options.view_worker.clone(),
        open_thread,
    };

    let interval = match options.interval.as_deref() {
        Some(raw) => parse_duration(raw)?,
        None => ctx.config.sync.poll_interval()?,
    };
    let timeout = match options.timeout.as_deref() {
        Some(raw) => parse_duration(raw)?,
        None => ctx.config.sync.poll_timeout()?,
    };

    let source = StoreSyncSource::new(ctx.store.clone());
    let view = Arc::new(Mutex::new(ViewState::new(viewer, scope)));
    let poller = Poller::new(source, Arc::clone(&view), interval, timeout)?;
    let stop = poller.stop_handle();

    if !ctx.out.quiet && !ctx.out.json {
        println!("fieldops watch: polling every {interval:?} (ctrl-c to stop)");
    }

    let json = ctx.out.json;
    let quiet = ctx.out.quiet;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let loop_handle = tokio::spawn(poller.run(move |signals| {
            for signal in signals {
                print_signal(&signal, json, quiet);
            }
        }));

        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
        let _ = loop_handle.await;
    });

    Ok(())
}

fn print_signal(signal: &SyncSignal, json: bool, quiet: bool) {
    match signal {
        SyncSignal::NewMessages { thread, count } => {
            if json {
                let row = serde_json::json!({
                    "signal": "new_messages",
                    "project_id": thread.project_id,
                    "task_id": thread.task_id,
                    "count": count,
                });
                println!("{row}");
            } else if !quiet {
                println!(
                    "new message(s) in {}:{} ({count} from the other side)",
                    thread.project_id, thread.task_id
                );
            }
        }
    }
}
