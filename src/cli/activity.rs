//! fieldops activity command implementation
//!
//! Read side of the audit trail with the display ordering (date descending,
//! id tie-break) and the user/project/task/since filters.

use chrono::{DateTime, Utc};

use super::Context;
use crate::activity::{format_entry, ActivityFilter, ActivityLog};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};

pub struct ActivityOptions {
    pub project: Option<String>,
    pub task: Option<String>,
    pub user: Option<String>,
    pub since: Option<String>,
    pub limit: usize,
}

pub fn run(ctx: &Context, options: ActivityOptions) -> Result<()> {
    let since = match options.since.as_deref() {
        Some(raw) => Some(parse_since(raw)?),
        None => None,
    };

    let filter = ActivityFilter {
        user: options.user,
        project_id: options.project,
        task_id: options.task,
        since,
    };

    let log = ActivityLog::for_store(&ctx.store);
    let entries = log.read_filtered(&filter, Some(options.limit))?;

    #[derive(serde::Serialize)]
    struct ActivityReport {
        entries: Vec<crate::activity::ActivityEntry>,
    }

    let mut human = HumanOutput::new(format!("fieldops activity: {} entr(ies)", entries.len()));
    for entry in &entries {
        human.push_detail(format_entry(entry));
    }

    emit_success(
        ctx.out,
        "activity",
        &ActivityReport { entries },
        Some(&human),
    )
}

/// Accept a full RFC 3339 timestamp or a bare date (midnight UTC).
fn parse_since(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(Error::InvalidArgument(format!(
        "invalid --since '{raw}': expected RFC 3339 or YYYY-MM-DD"
    )))
}
