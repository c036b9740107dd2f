//! Configuration loading and management
//!
//! Handles parsing of `fieldops.toml` from the store's data directory.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const CONFIG_FILENAME: &str = "fieldops.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Sync reconciler configuration
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            actor: ActorConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// Actor-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Default actor name when none specified
    #[serde(default = "default_actor")]
    pub default: String,
}

fn default_actor() -> String {
    "Office".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            default: default_actor(),
        }
    }
}

/// Sync reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Poll interval (e.g. "2s")
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Per-poll timeout; must be shorter than the interval so a slow poll
    /// never blocks the next tick indefinitely
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout: String,
}

fn default_poll_interval() -> String {
    "2s".to_string()
}

fn default_poll_timeout() -> String {
    "1500ms".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            poll_timeout: default_poll_timeout(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Result<Duration> {
        parse_duration(&self.poll_interval)
    }

    pub fn poll_timeout(&self) -> Result<Duration> {
        parse_duration(&self.poll_timeout)
    }

    /// Reject a timeout that is not strictly shorter than the interval.
    pub fn validate(&self) -> Result<()> {
        let interval = self.poll_interval()?;
        let timeout = self.poll_timeout()?;
        if timeout >= interval {
            return Err(Error::InvalidConfig(format!(
                "sync.poll_timeout ({}) must be shorter than sync.poll_interval ({})",
                self.poll_timeout, self.poll_interval
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a data directory, falling back to defaults
    /// when the file is absent or unreadable.
    pub fn load_from_dir(dir: &Path) -> Config {
        let path = dir.join(CONFIG_FILENAME);
        if !path.exists() {
            return Config::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!("ignoring invalid {}: {}", CONFIG_FILENAME, err);
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    /// Load configuration, surfacing parse errors instead of defaulting.
    pub fn load_strict(dir: &Path) -> Result<Config> {
        let path = dir.join(CONFIG_FILENAME);
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        config.sync.validate()?;
        Ok(config)
    }
}

/// Parse a human duration string like "2s", "1500ms", "5m".
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if s.is_empty() {
        return Err(Error::InvalidArgument("duration cannot be empty".to_string()));
    }

    let (num_str, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s, "s"),
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("invalid duration number: {num_str}")))?;

    let duration = match unit.trim().to_lowercase().as_str() {
        "ms" | "millis" => Duration::from_millis(num),
        "s" | "sec" | "second" | "seconds" => Duration::from_secs(num),
        "m" | "min" | "minute" | "minutes" => Duration::from_secs(num * 60),
        "h" | "hr" | "hour" | "hours" => Duration::from_secs(num * 3600),
        _ => {
            return Err(Error::InvalidArgument(format!(
                "invalid duration unit '{unit}'. Expected: ms, s, m, h"
            )));
        }
    };

    Ok(duration)
}
