//! fieldops init command implementation
//!
//! Creates the data directory layout: projects/, threads/, activity/, and
//! an empty worker registry.

use std::path::PathBuf;

use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::Store;

#[derive(serde::Serialize)]
struct InitReport {
    data_dir: PathBuf,
    already_initialized: bool,
}

pub fn run(data_dir: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let dir = super::resolve_data_dir(data_dir)?;
    let store = Store::new(dir.clone());

    let already_initialized = store.is_initialized();
    if !already_initialized {
        store.init()?;
    }

    let report = InitReport {
        data_dir: dir.clone(),
        already_initialized,
    };

    let header = if already_initialized {
        "fieldops init: nothing to do"
    } else {
        "fieldops init: store created"
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("data dir", dir.display().to_string());
    if !already_initialized {
        human.push_next_step("fieldops worker add <name>");
        human.push_next_step("fieldops project add <number> <client>");
    }

    emit_success(OutputOptions { json, quiet }, "init", &report, Some(&human))
}
