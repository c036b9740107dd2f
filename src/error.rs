//! Error types for fieldops
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown id, guard violated)
//! - 3: Blocked pending confirmation or lost a write race
//! - 4: Operation failed (store unavailable, lock timeout)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the fieldops CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const CONFLICT: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for fieldops operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid transition: cannot {action} while {current} (allowed from: {allowed})")]
    InvalidTransition {
        current: String,
        action: String,
        allowed: String,
    },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Conflicts (exit code 3)
    #[error("Stale state on task {task_id}: expected {expected}, found {found} — re-fetch and retry")]
    StaleState {
        task_id: String,
        expected: String,
        found: String,
    },

    #[error("Reassignment of task {task_id} (currently {status}) requires confirmation")]
    ReassignConfirmationRequired { task_id: String, status: String },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Store not initialized at {0} (run `fieldops init`)")]
    StoreNotInitialized(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::InvalidTransition { .. }
            | Error::TaskNotFound(_)
            | Error::ProjectNotFound(_)
            | Error::WorkerNotFound(_)
            | Error::Validation(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_) => exit_codes::USER_ERROR,

            // Conflicts
            Error::StaleState { .. } | Error::ReassignConfirmationRequired { .. } => {
                exit_codes::CONFLICT
            }

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::StoreNotInitialized(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Whether a read may be retried after this error. Writes are never
    /// retried blindly: `assign` and `transition` are not idempotent.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Io(_) | Error::LockFailed(_))
    }

    /// Structured details for the JSON error envelope, when the error
    /// carries more than its message.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::InvalidTransition {
                current,
                action,
                allowed,
            } => Some(serde_json::json!({
                "current": current,
                "action": action,
                "allowed_from": allowed,
            })),
            Error::StaleState {
                task_id,
                expected,
                found,
            } => Some(serde_json::json!({
                "task_id": task_id,
                "expected": expected,
                "found": found,
            })),
            _ => None,
        }
    }
}

/// Result type alias for fieldops operations
pub type Result<T> = std::result::Result<T, Error>;
