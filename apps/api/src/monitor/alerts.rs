use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::errors::MonitorResult;
use super::store::Store;
use crate::domain::agent::{AgentRecord, AgentStatus};
use crate::domain::alert::{Alert, AlertDraft, AlertKind, Severity};
use crate::domain::repositories::AlertRepository;
use crate::domain::task::{TaskRecord, TaskState};
use crate::domain::window::TimeWindow;

/// How far back failed tasks are reported
const FAILURE_LOOKBACK_HOURS: i64 = 24;

/// Longest task description quoted in an alert title
const TITLE_EXCERPT_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    /// Running time after which a task counts as timed out
    pub task_timeout: Duration,
    pub enable_task_failure: bool,
    pub enable_task_timeout: bool,
    pub enable_agent_offline: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::minutes(30),
            enable_task_failure: true,
            enable_task_timeout: true,
            enable_agent_offline: true,
        }
    }
}

fn excerpt(task: &TaskRecord) -> String {
    match task.description() {
        Some(text) => text.chars().take(TITLE_EXCERPT_CHARS).collect(),
        None => task.id().to_string(),
    }
}

fn failure_alert(task: &TaskRecord) -> AlertDraft {
    AlertDraft {
        dedup_key: format!("task_failure:{}", task.id()),
        kind: AlertKind::TaskFailure,
        severity: Severity::Error,
        title: format!("Task failed: {}", excerpt(task)),
        message: Some(
            task.result()
                .unwrap_or("Task ended in failure")
                .to_string(),
        ),
        agent_name: Some(task.agent_name().to_string()),
        task_id: Some(task.id().to_string()),
    }
}

fn timeout_alert(task: &TaskRecord, timeout: Duration) -> AlertDraft {
    AlertDraft {
        dedup_key: format!("task_timeout:{}", task.id()),
        kind: AlertKind::TaskTimeout,
        severity: Severity::Warning,
        title: format!("Task timed out: {}", excerpt(task)),
        message: Some(format!(
            "Task has been running for more than {} minutes",
            timeout.num_minutes()
        )),
        agent_name: Some(task.agent_name().to_string()),
        task_id: Some(task.id().to_string()),
    }
}

fn offline_alert(agent: &AgentRecord, last_seen: DateTime<Utc>) -> AlertDraft {
    AlertDraft {
        dedup_key: format!("agent_offline:{}:{}", agent.name(), last_seen.to_rfc3339()),
        kind: AlertKind::AgentOffline,
        severity: Severity::Warning,
        title: format!("Agent offline: {}", agent.name()),
        message: Some(format!("Last seen at {}", last_seen.to_rfc3339())),
        agent_name: Some(agent.name().to_string()),
        task_id: None,
    }
}

/// Alerts warranted by the given state at `now`
pub fn detect(
    config: &AlertConfig,
    failed: &[TaskRecord],
    active: &[TaskRecord],
    agents: &[AgentRecord],
    now: DateTime<Utc>,
) -> Vec<AlertDraft> {
    let mut drafts = Vec::new();

    if config.enable_task_failure {
        drafts.extend(
            failed
                .iter()
                .filter(|task| task.state() == TaskState::Failed)
                .map(failure_alert),
        );
    }

    if config.enable_task_timeout {
        drafts.extend(
            active
                .iter()
                .filter(|task| task.state() == TaskState::Running)
                .filter(|task| {
                    task.started_at()
                        .map_or(false, |started| now - started > config.task_timeout)
                })
                .map(|task| timeout_alert(task, config.task_timeout)),
        );
    }

    if config.enable_agent_offline {
        drafts.extend(agents.iter().filter_map(|agent| {
            match (agent.status(), agent.last_seen_at()) {
                (AgentStatus::Offline, Some(seen)) => Some(offline_alert(agent, seen)),
                _ => None,
            }
        }));
    }

    drafts
}

/// Periodic scan that records deduplicated alerts
pub struct AlertDetector {
    store: Arc<Store>,
    alerts: Arc<dyn AlertRepository>,
    config: AlertConfig,
}

impl AlertDetector {
    pub fn new(store: Arc<Store>, alerts: Arc<dyn AlertRepository>, config: AlertConfig) -> Self {
        Self {
            store,
            alerts,
            config,
        }
    }

    /// Runs every enabled check once
    ///
    /// # Returns
    /// The alerts raised by this run. Conditions already alerted on are
    /// not raised again.
    pub async fn check(&self) -> MonitorResult<Vec<Alert>> {
        let now = self.store.now();

        let failed = if self.config.enable_task_failure {
            let window = TimeWindow::last(Duration::hours(FAILURE_LOOKBACK_HOURS), now)
                .unwrap_or_else(TimeWindow::all);
            self.store.history(&window).await?
        } else {
            Vec::new()
        };
        let active = if self.config.enable_task_timeout {
            self.store.active_tasks().await?
        } else {
            Vec::new()
        };
        let agents = if self.config.enable_agent_offline {
            self.store.list_agents().await?
        } else {
            Vec::new()
        };

        let mut raised = Vec::new();
        for draft in detect(&self.config, &failed, &active, &agents, now) {
            if let Some(alert) = self.alerts.record(&draft, now).await? {
                tracing::info!(kind = %alert.kind, key = %alert.dedup_key, "Alert raised");
                raised.push(alert);
            }
        }

        Ok(raised)
    }

    /// Most recent alerts first
    pub async fn recent(&self, limit: i64) -> MonitorResult<Vec<Alert>> {
        Ok(self.alerts.recent(limit).await?)
    }
}
