use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AlertKind {
    TaskFailure,
    TaskTimeout,
    AgentOffline,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::TaskFailure => write!(f, "task_failure"),
            AlertKind::TaskTimeout => write!(f, "task_timeout"),
            AlertKind::AgentOffline => write!(f, "agent_offline"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// An alert that has not been stored yet
///
/// `dedup_key` identifies the condition; storing the same key twice is a
/// no-op, so repeated detector runs never duplicate alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDraft {
    pub dedup_key: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub message: Option<String>,
    pub agent_name: Option<String>,
    pub task_id: Option<String>,
}

/// A stored alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Alert {
    pub id: i64,
    pub dedup_key: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub message: Option<String>,
    pub agent_name: Option<String>,
    pub task_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
