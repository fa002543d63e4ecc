//! Shared setup for integration tests

#![allow(dead_code)]

use agent_dashboard_api::api::AppState;
use agent_dashboard_api::config::MonitorConfig;
use agent_dashboard_api::domain::agent::Roster;
use agent_dashboard_api::infrastructure::Database;
use agent_dashboard_api::monitor::{Clock, ManualClock};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub db: Database,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
}

/// Config with the two-agent roster used throughout the tests
pub fn test_config(active_tasks_file: Option<PathBuf>) -> MonitorConfig {
    let mut vars = HashMap::new();
    vars.insert("AGENT_ROSTER", "Chief,Coder".to_string());
    if let Some(path) = active_tasks_file {
        vars.insert("ACTIVE_TASKS_FILE", path.display().to_string());
    }

    MonitorConfig::from_lookup(|key| vars.get(key).cloned())
        .expect("test config should be valid")
}

/// Fresh in-memory store with the roster initialized
pub async fn setup() -> TestApp {
    setup_with(test_config(None)).await
}

pub async fn setup_with(config: MonitorConfig) -> TestApp {
    let db = Database::in_memory()
        .await
        .expect("Failed to open in-memory database");
    let clock = Arc::new(ManualClock::new(start_time()));

    let state = AppState::new(&db, &config, clock.clone() as Arc<dyn Clock>);
    state
        .store
        .initialize()
        .await
        .expect("Failed to initialize roster");

    assert_eq!(
        state.store.roster(),
        &Roster::new(["Chief", "Coder"]).unwrap()
    );

    TestApp { state, clock, db }
}
