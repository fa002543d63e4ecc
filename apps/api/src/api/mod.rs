// API layer module (adapters for controllers)
// Follows Hexagonal Architecture - API is an adapter

pub mod errors;
pub mod handlers;
pub mod params;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::Duration;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::MonitorConfig;
use crate::infrastructure::repositories::{SqliteAlertRepository, SqliteStateRepository};
use crate::infrastructure::Database;
use crate::monitor::{Aggregator, AlertDetector, Clock, Collector, Store};

use handlers::{agents, alerts, stats, system, tasks};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub collector: Arc<Collector>,
    pub aggregator: Arc<Aggregator>,
    pub alerts: Arc<AlertDetector>,
    pub active_tasks_file: Option<PathBuf>,
    /// Stats window used when a request names none
    pub stats_window: Duration,
}

impl AppState {
    /// Wires the monitoring core over `db`
    pub fn new(db: &Database, config: &MonitorConfig, clock: Arc<dyn Clock>) -> Self {
        let state_repo = Arc::new(SqliteStateRepository::new(db.pool().clone()));
        let alert_repo = Arc::new(SqliteAlertRepository::new(db.pool().clone()));

        let store = Arc::new(Store::new(
            state_repo,
            config.roster.clone(),
            config.staleness,
            clock,
        ));

        Self {
            collector: Arc::new(Collector::new(store.clone())),
            aggregator: Arc::new(Aggregator::new(store.clone(), alert_repo.clone())),
            alerts: Arc::new(AlertDetector::new(
                store.clone(),
                alert_repo,
                config.alerts.clone(),
            )),
            store,
            active_tasks_file: config.active_tasks_file.clone(),
            stats_window: config.stats_window,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(system::health_check))
        // Agents
        .route("/api/agents", get(agents::list_agents))
        .route("/api/agents/:name", get(agents::get_agent))
        .route("/api/agents/:name/report", post(agents::report))
        .route("/api/agents/:name/heartbeat", post(agents::heartbeat))
        .route("/api/agents/:name/tasks", post(agents::open_task))
        // Tasks
        .route("/api/tasks", get(tasks::list_tasks))
        .route("/api/tasks/history", get(tasks::task_history))
        .route("/api/tasks/:id", get(tasks::get_task))
        .route("/api/tasks/:id/transition", post(tasks::transition_task))
        // Stats and alerts
        .route("/api/stats", get(stats::get_stats))
        .route("/api/alerts", get(alerts::list_alerts))
        .route("/api/alerts/check", post(alerts::check_alerts))
        // Data sources
        .route("/api/sync", post(system::sync_now))
        .with_state(state)
}
