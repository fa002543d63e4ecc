use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::errors::{MonitorError, MonitorResult};
use super::sources::{self, ActiveTaskEntry};
use super::store::Store;
use crate::domain::agent::{AgentRecord, AgentStatus};
use crate::domain::task::{TaskId, TaskProfile, TaskRecord, TaskState, TokenUsage};

/// Errors from a file sync run
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to read active tasks file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed active tasks file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] MonitorError),
}

/// Outcome of one file sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Entries reconciled without error
    pub processed: usize,
    /// Tasks created or moved forward
    pub changed: usize,
    /// Entries with no id or no assignee
    pub skipped: usize,
    /// Entries rejected by the store
    pub errors: usize,
}

/// Single writer of agent and task state
///
/// Every ingestion path (HTTP reports, heartbeats, the active-tasks file)
/// funnels through here and lands in the store as one write session per
/// signal.
pub struct Collector {
    store: Arc<Store>,
}

impl Collector {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Ingests a status report, creating or starting the named task
    ///
    /// A report naming an unseen task creates it, and starts it when the
    /// agent says it is busy. A pending task is started the same way. A
    /// task that already ended is not touched and the agent's current task
    /// is cleared. Nothing is written when any step fails.
    pub async fn report(
        &self,
        agent_name: &str,
        status: AgentStatus,
        task_id: Option<TaskId>,
        description: Option<String>,
    ) -> MonitorResult<AgentRecord> {
        self.report_with_profile(agent_name, status, task_id, description, TaskProfile::default())
            .await
    }

    /// Same as [`report`](Collector::report), with the profile used when
    /// the report creates its task
    pub async fn report_with_profile(
        &self,
        agent_name: &str,
        status: AgentStatus,
        task_id: Option<TaskId>,
        description: Option<String>,
        profile: TaskProfile,
    ) -> MonitorResult<AgentRecord> {
        let mut session = self.store.begin(agent_name).await?;
        let now = session.now();
        let mut current = task_id;

        if let Some(id) = current.clone() {
            match session.find_task(&id).await? {
                None => {
                    session
                        .create_task_with_profile(id.clone(), description, profile)
                        .await?;
                    if status == AgentStatus::Busy {
                        session.transition_task(&id, TaskState::Running, None).await?;
                    }
                }
                Some(task) if task.agent_name() != agent_name => {
                    return Err(MonitorError::Conflict(format!(
                        "task {} belongs to {}",
                        id,
                        task.agent_name()
                    )));
                }
                Some(task) if task.state().is_terminal() => {
                    tracing::warn!(
                        agent = %agent_name,
                        task_id = %id,
                        state = %task.state(),
                        "Report references a finished task, ignoring it"
                    );
                    current = None;
                }
                Some(task) => {
                    if status == AgentStatus::Busy && task.state() == TaskState::Pending {
                        session.transition_task(&id, TaskState::Running, None).await?;
                    }
                }
            }
        } else if status == AgentStatus::Busy {
            // Busy without a task id keeps pointing at the active task
            current = session.active_task().await?.map(|task| task.id().clone());
            if let Some(id) = &current {
                tracing::debug!(agent = %agent_name, task_id = %id, "Busy report keeps active task");
            }
        }

        session.upsert(status, current, now);
        let agent = session.commit().await?;

        tracing::debug!(agent = %agent_name, status = %status, "Report recorded");
        Ok(agent.project(self.store.now(), self.store.staleness()))
    }

    /// Refreshes an agent's liveness
    pub async fn heartbeat(&self, agent_name: &str) -> MonitorResult<AgentRecord> {
        let mut session = self.store.begin(agent_name).await?;
        let now = session.now();

        if session.heartbeat(now) {
            tracing::info!(
                agent = %agent_name,
                status = %session.agent().status(),
                "Agent back after heartbeat"
            );
        }

        let agent = session.commit().await?;
        Ok(agent.project(self.store.now(), self.store.staleness()))
    }

    /// Creates a pending task for `agent_name`
    pub async fn open_task(
        &self,
        agent_name: &str,
        description: Option<String>,
        profile: TaskProfile,
    ) -> MonitorResult<TaskRecord> {
        let mut session = self.store.begin(agent_name).await?;
        let task = session
            .create_task_with_profile(TaskId::generate(), description, profile)
            .await?;
        session.commit().await?;
        Ok(task)
    }

    /// Applies a task transition reported by the owning agent
    ///
    /// `usage`, when given, replaces the task's token totals in the same
    /// write. When the task ends the agent's current task reference is
    /// cleared if it pointed at it.
    pub async fn update_task(
        &self,
        task_id: &TaskId,
        state: TaskState,
        result: Option<String>,
        usage: Option<TokenUsage>,
    ) -> MonitorResult<TaskRecord> {
        let mut session = self.store.begin_for_task(task_id).await?;
        if let Some(usage) = usage {
            session.record_usage(task_id, usage).await?;
        }
        let task = session.transition_task(task_id, state, result).await?;
        if task.state().is_terminal() {
            session.release_task(task_id);
        }
        session.commit().await?;
        Ok(task)
    }

    /// Reconciles the store with an active-tasks file
    ///
    /// Entries rejected by the store are counted and skipped. Storage
    /// failures abort the run.
    pub async fn sync_active_tasks(&self, path: &Path) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        let Some(contents) = sources::read_active_tasks(path).await? else {
            tracing::debug!(path = %path.display(), "Active tasks file not found");
            return Ok(report);
        };
        let document = sources::parse_active_tasks(&contents)?;

        for entry in &document.tasks {
            let Some(assignee) = entry.assignee().filter(|_| !entry.id.trim().is_empty()) else {
                report.skipped += 1;
                continue;
            };

            match self.sync_entry(assignee, entry).await {
                Ok(changed) => {
                    report.processed += 1;
                    if changed {
                        report.changed += 1;
                    }
                }
                Err(e) if e.is_storage() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(task_id = %entry.id, error = %e, "Skipping task entry");
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            changed = report.changed,
            skipped = report.skipped,
            errors = report.errors,
            "Active tasks synced"
        );
        Ok(report)
    }

    async fn sync_entry(&self, assignee: &str, entry: &ActiveTaskEntry) -> MonitorResult<bool> {
        let id = TaskId::new(entry.id.trim());
        let target = entry.state();

        let mut session = self.store.begin(assignee).await?;
        let now = session.now();
        let mut changed = false;

        let current = match session.find_task(&id).await? {
            Some(task) if task.agent_name() != assignee => {
                return Err(MonitorError::Conflict(format!(
                    "task {} belongs to {}",
                    id,
                    task.agent_name()
                )));
            }
            Some(task) => task.state(),
            None => {
                session
                    .create_task_with_profile(id.clone(), entry.summary(), entry.profile())
                    .await?;
                changed = true;
                TaskState::Pending
            }
        };

        if let Some(usage) = entry.usage() {
            changed |= session.record_usage(&id, usage).await?;
        }

        let Some(steps) = current.path_to(target) else {
            tracing::debug!(task_id = %id, from = %current, to = %target, "Ignoring backward move");
            session.commit().await?;
            return Ok(changed);
        };

        for step in &steps {
            session.transition_task(&id, *step, None).await?;
        }
        changed |= !steps.is_empty();

        if steps.contains(&TaskState::Running) && target == TaskState::Running {
            session.upsert(AgentStatus::Busy, Some(id.clone()), now);
        } else if target.is_terminal()
            && !steps.is_empty()
            && session.agent().current_task_id() == Some(&id)
        {
            session.upsert(AgentStatus::Idle, None, now);
        }

        session.commit().await?;
        Ok(changed)
    }
}
