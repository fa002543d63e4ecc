use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::errors::MonitorResult;
use super::store::Store;
use crate::domain::agent::{AgentStatus, Roster};
use crate::domain::repositories::AlertRepository;
use crate::domain::task::{TaskRecord, TaskState, TokenUsage};
use crate::domain::window::TimeWindow;

/// Task counts by state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

impl StateCounts {
    fn add(&mut self, state: TaskState) {
        match state {
            TaskState::Pending => self.pending += 1,
            TaskState::Running => self.running += 1,
            TaskState::Completed => self.completed += 1,
            TaskState::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.running + self.completed + self.failed
    }

    /// completed / (completed + failed), 0 when nothing has finished
    pub fn completion_rate(&self) -> f64 {
        let finished = self.completed + self.failed;
        if finished == 0 {
            return 0.0;
        }
        round_to(self.completed as f64 / finished as f64, 4)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStats {
    pub name: String,
    #[serde(flatten)]
    pub counts: StateCounts,
    pub total: u64,
    pub completion_rate: f64,
    /// Mean completed-task duration in seconds
    pub avg_duration_secs: Option<f64>,
    #[serde(flatten)]
    pub usage: TokenUsage,
    pub total_tokens: i64,
}

/// Statistics for one window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatSnapshot {
    pub window: TimeWindow,
    pub agents: Vec<AgentStats>,
    pub totals: StateCounts,
    pub total: u64,
    pub running_tasks: u64,
    pub completion_rate: f64,
    pub avg_duration_secs: Option<f64>,
    #[serde(flatten)]
    pub usage: TokenUsage,
    pub total_tokens: i64,
    /// Roster agents whose effective status is busy
    pub active_agents: u64,
    /// Alerts raised inside the window
    pub total_alerts: i64,
}

#[derive(Default)]
struct Tally {
    counts: StateCounts,
    durations: Vec<f64>,
    usage: TokenUsage,
}

impl Tally {
    fn add(&mut self, task: &TaskRecord) {
        self.counts.add(task.state());
        self.usage += task.usage();
        if task.state() == TaskState::Completed {
            if let Some(duration) = task.duration() {
                self.durations.push(duration.num_milliseconds() as f64 / 1000.0);
            }
        }
    }

    fn avg_duration(&self) -> Option<f64> {
        if self.durations.is_empty() {
            return None;
        }
        let sum: f64 = self.durations.iter().sum();
        Some(round_to(sum / self.durations.len() as f64, 2))
    }
}

/// Whether `task` belongs to `window`
///
/// Ended tasks count by when they ended; active tasks count when they
/// already existed by the end of the window.
fn in_window(task: &TaskRecord, window: &TimeWindow) -> bool {
    match task.ended_at() {
        Some(ended) => window.contains(ended),
        None => window.reaches(task.created_at()),
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Builds a snapshot from a set of tasks
///
/// Agents appear in roster order, including those with no tasks. Tasks of
/// agents outside the roster only count towards the totals. Agent activity
/// and alert counts are left at zero for [`Aggregator::stats`] to fill.
pub fn summarize(roster: &Roster, tasks: &[TaskRecord], window: &TimeWindow) -> StatSnapshot {
    let mut per_agent: HashMap<&str, Tally> = HashMap::new();
    let mut overall = Tally::default();

    for task in tasks.iter().filter(|task| in_window(task, window)) {
        overall.add(task);
        per_agent.entry(task.agent_name()).or_default().add(task);
    }

    let agents = roster
        .names()
        .map(|name| {
            let tally = per_agent.remove(name).unwrap_or_default();
            AgentStats {
                name: name.to_string(),
                counts: tally.counts,
                total: tally.counts.total(),
                completion_rate: tally.counts.completion_rate(),
                avg_duration_secs: tally.avg_duration(),
                usage: tally.usage,
                total_tokens: tally.usage.total(),
            }
        })
        .collect();

    StatSnapshot {
        window: *window,
        agents,
        totals: overall.counts,
        total: overall.counts.total(),
        running_tasks: overall.counts.running,
        completion_rate: overall.counts.completion_rate(),
        avg_duration_secs: overall.avg_duration(),
        usage: overall.usage,
        total_tokens: overall.usage.total(),
        active_agents: 0,
        total_alerts: 0,
    }
}

/// Read-only statistics over the store
pub struct Aggregator {
    store: Arc<Store>,
    alerts: Arc<dyn AlertRepository>,
}

impl Aggregator {
    pub fn new(store: Arc<Store>, alerts: Arc<dyn AlertRepository>) -> Self {
        Self { store, alerts }
    }

    /// Snapshot for an absolute window
    ///
    /// Agents and tasks come from one consistent read, so a task that ends
    /// while the snapshot is taken is counted exactly once.
    pub async fn stats(&self, window: &TimeWindow) -> MonitorResult<StatSnapshot> {
        let state = self.store.snapshot(window).await?;

        let mut snapshot = summarize(self.store.roster(), &state.tasks, window);
        snapshot.active_agents = state
            .agents
            .iter()
            .filter(|agent| agent.status() == AgentStatus::Busy)
            .count() as u64;
        snapshot.total_alerts = self.alerts.count_in(window).await?;

        Ok(snapshot)
    }
}
