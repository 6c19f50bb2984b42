// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: a TOML file under the user's state directory,
//! with fixed well-known paths derived from it (spec §6 Config adapter
//! contract).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not resolve a state directory for this platform")]
    NoStateDir,
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to create state directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Raw TOML shape. Every field is optional so unknown or partial files are
/// never a hard error; missing keys fall back to [`Config::default`].
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct RawConfig {
    worker_prefix: Option<String>,
    worktree_subdir: Option<String>,
    session_prefix: Option<String>,
    default_container_ref: Option<String>,
    log_level: Option<String>,
    status_poll_interval_ms: Option<u64>,
    status_debounce_ms: Option<u64>,
    todo_interval_ms: Option<u64>,
    diff_interval_ms: Option<u64>,
    diff_debounce_ms: Option<u64>,
    health_check_interval_ms: Option<u64>,
}

/// Resolved daemon configuration, ready to hand to the engine and adapters.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub log_path: PathBuf,
    pub worker_prefix: String,
    pub worktree_subdir: String,
    pub session_prefix: String,
    pub default_container_ref: Option<String>,
    pub log_level: String,
    pub status_poll_interval: Duration,
    pub status_debounce: Duration,
    pub todo_interval: Duration,
    pub diff_interval: Duration,
    pub diff_debounce: Duration,
    pub health_check_interval: Duration,
}

impl Config {
    /// Load configuration for the daemon, reading `config.toml` under the
    /// state directory if present and falling back to defaults for every
    /// key it omits.
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = state_dir()?;
        std::fs::create_dir_all(&state_dir).map_err(|e| ConfigError::CreateDir {
            path: state_dir.display().to_string(),
            source: e,
        })?;

        let config_path = state_dir.join("config.toml");
        let raw = if config_path.exists() {
            let text = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Read {
                path: config_path.display().to_string(),
                source: e,
            })?;
            toml::from_str(&text).map_err(|e| ConfigError::Parse {
                path: config_path.display().to_string(),
                source: e,
            })?
        } else {
            RawConfig::default()
        };

        Ok(Self::from_raw(state_dir, raw))
    }

    fn from_raw(state_dir: PathBuf, raw: RawConfig) -> Self {
        let defaults = orchestra_engine::PollingConfig::default();
        Self {
            socket_path: state_dir.join("daemon.sock"),
            log_path: state_dir.join("daemon.log"),
            worker_prefix: raw.worker_prefix.unwrap_or_else(|| "worker".to_string()),
            worktree_subdir: raw.worktree_subdir.unwrap_or_else(|| "worktrees".to_string()),
            session_prefix: raw.session_prefix.unwrap_or_else(|| "orchestra".to_string()),
            default_container_ref: raw.default_container_ref,
            log_level: raw.log_level.unwrap_or_else(|| "info".to_string()),
            status_poll_interval: raw
                .status_poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.status_poll_interval),
            status_debounce: raw
                .status_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.status_debounce),
            todo_interval: raw
                .todo_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.todo_interval),
            diff_interval: raw
                .diff_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.diff_interval),
            diff_debounce: raw
                .diff_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.diff_debounce),
            health_check_interval: raw
                .health_check_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.health_check_interval),
            state_dir,
        }
    }

    pub fn polling_config(&self) -> orchestra_engine::PollingConfig {
        orchestra_engine::PollingConfig {
            status_poll_interval: self.status_poll_interval,
            status_debounce: self.status_debounce,
            todo_interval: self.todo_interval,
            diff_interval: self.diff_interval,
            diff_debounce: self.diff_debounce,
            health_check_interval: self.health_check_interval,
        }
    }
}

fn state_dir() -> Result<PathBuf, ConfigError> {
    // ORCHESTRA_STATE_DIR takes priority, used by tests for isolation.
    if let Ok(dir) = std::env::var("ORCHESTRA_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("orchestra"))
        .ok_or(ConfigError::NoStateDir)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
