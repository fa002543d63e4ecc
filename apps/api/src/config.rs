use chrono::Duration;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::agent::Roster;
use crate::monitor::AlertConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Runtime settings, read from the environment
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub roster: Roster,
    /// Silence after which an agent reads as offline
    pub staleness: Duration,
    /// Window used by `/api/stats` when none is requested
    pub stats_window: Duration,
    /// Active-tasks file to poll, sync is off when unset
    pub active_tasks_file: Option<PathBuf>,
    pub sync_interval: std::time::Duration,
    pub alert_interval: std::time::Duration,
    pub alerts: AlertConfig,
}

impl MonitorConfig {
    /// Loads settings from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through `lookup`, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let roster = match get("AGENT_ROSTER") {
            Some(list) => Roster::parse(&list).map_err(|reason| ConfigError::Invalid {
                key: "AGENT_ROSTER",
                reason,
            })?,
            None => Roster::default(),
        };

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8001".to_string());
        let bind_addr = bind_addr.parse().map_err(|e| ConfigError::Invalid {
            key: "BIND_ADDR",
            reason: format!("{}", e),
        })?;

        let alerts = AlertConfig {
            task_timeout: span(&get, "ALERT_TASK_TIMEOUT_MINUTES", 30, Duration::try_minutes)?,
            enable_task_failure: flag(&get, "ENABLE_TASK_FAILURE_ALERT", true)?,
            enable_task_timeout: flag(&get, "ENABLE_TASK_TIMEOUT_ALERT", true)?,
            enable_agent_offline: flag(&get, "ENABLE_AGENT_OFFLINE_ALERT", true)?,
        };

        Ok(Self {
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://data/dashboard.db".to_string()),
            bind_addr,
            roster,
            staleness: span(&get, "STALENESS_THRESHOLD_SECS", 60, Duration::try_seconds)?,
            stats_window: span(&get, "STATS_WINDOW_HOURS", 24, Duration::try_hours)?,
            active_tasks_file: get("ACTIVE_TASKS_FILE").map(PathBuf::from),
            sync_interval: std::time::Duration::from_secs(
                number(&get, "SYNC_INTERVAL_SECS", 30)? as u64,
            ),
            alert_interval: std::time::Duration::from_secs(
                number(&get, "ALERT_CHECK_INTERVAL_SECS", 60)? as u64,
            ),
            alerts,
        })
    }
}

/// Positive integer setting
fn number<G>(get: &G, key: &'static str, default: i64) -> Result<i64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };

    match i64::from_str(raw.trim()) {
        Ok(value) if value > 0 => Ok(value),
        Ok(_) => Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}

/// Positive duration setting counted in the unit of `to_duration`
fn span<G>(
    get: &G,
    key: &'static str,
    default: i64,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    to_duration(number(get, key, default)?).ok_or_else(|| ConfigError::Invalid {
        key,
        reason: "out of range".to_string(),
    })
}

fn flag<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got {}", other),
        }),
    }
}
