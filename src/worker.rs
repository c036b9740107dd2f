//! Worker model and registry.
//!
//! Tasks hold `assigned_to` as a worker id, never a worker object;
//! resolution happens by lookup at read time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};

/// A field worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub skills: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<f64>,
}

impl Worker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string().to_lowercase(),
            name: name.into(),
            phone: None,
            skills: BTreeSet::new(),
            hourly_rate: None,
        }
    }
}

/// The worker collection persisted as one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerRegistry {
    #[serde(default)]
    pub workers: Vec<Worker>,
}

impl WorkerRegistry {
    pub fn find(&self, id: &str) -> Option<&Worker> {
        self.workers.iter().find(|worker| worker.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&Worker> {
        self.find(id)
            .ok_or_else(|| Error::WorkerNotFound(id.to_string()))
    }

    pub fn insert(&mut self, worker: Worker) -> Result<()> {
        if self.find(&worker.id).is_some() {
            return Err(Error::InvalidArgument(format!(
                "worker already exists: {}",
                worker.id
            )));
        }
        self.workers.push(worker);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Worker> {
        let pos = self.workers.iter().position(|worker| worker.id == id)?;
        Some(self.workers.remove(pos))
    }

    /// Display name for a worker id, falling back to the raw id when the
    /// reference is dangling.
    pub fn display_name(&self, id: &str) -> String {
        self.find(id)
            .map(|worker| worker.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}
