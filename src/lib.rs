//! fieldops - Task coordination for field crews
//!
//! A shared-store coordination layer between the office console and field
//! worker devices. Tasks move through an explicit lifecycle (assignment,
//! acceptance, execution, completion), every transition is audited, and
//! clients converge by polling the store and reconciling snapshots into
//! their local view.
//!
//! # Core modules
//!
//! - [`task`] / [`project`] / [`worker`]: the domain records
//! - [`lifecycle`]: the pure state machine; transitions produce effects
//! - [`assign`]: the engine that installs transitions and runs effects
//! - [`store`]: file-backed persistence with locking and atomic writes
//! - [`messages`] / [`notify`] / [`activity`]: per-task threads, worker
//!   notifications, and the append-only audit trail
//! - [`reconcile`] / [`poll`]: snapshot reconciliation and the polling loop

pub mod activity;
pub mod assign;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod messages;
pub mod notify;
pub mod output;
pub mod poll;
pub mod project;
pub mod reconcile;
pub mod store;
pub mod task;
pub mod worker;

pub use error::{Error, Result};
