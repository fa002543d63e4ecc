use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use agent_dashboard_api::api::{build_router, AppState};
use agent_dashboard_api::config::MonitorConfig;
use agent_dashboard_api::infrastructure::Database;
use agent_dashboard_api::monitor::SystemClock;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = MonitorConfig::from_env()?;

    // Connect to database
    tracing::info!(url = %config.database_url, "Connecting to database...");
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connected successfully");

    let state = AppState::new(&db, &config, Arc::new(SystemClock));
    state.store.initialize().await?;

    spawn_sync_loop(&state, &config);
    spawn_alert_loop(&state, &config);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    tracing::info!("Server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Polls the active-tasks file, when one is configured
fn spawn_sync_loop(state: &AppState, config: &MonitorConfig) {
    let Some(path) = config.active_tasks_file.clone() else {
        tracing::info!("ACTIVE_TASKS_FILE not set, file sync disabled");
        return;
    };

    let collector = state.collector.clone();
    let period = config.sync_interval;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = collector.sync_active_tasks(&path).await {
                tracing::error!(error = %e, path = %path.display(), "Active tasks sync failed");
            }
        }
    });
}

fn spawn_alert_loop(state: &AppState, config: &MonitorConfig) {
    let detector = state.alerts.clone();
    let period = config.alert_interval;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match detector.check().await {
                Ok(raised) if !raised.is_empty() => {
                    tracing::info!(count = raised.len(), "Alert check raised alerts");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Alert check failed"),
            }
        }
    });
}
