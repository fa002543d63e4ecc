//! End-to-end API integration tests
//!
//! These tests verify the complete HTTP API flows including:
//! - Agent listing and status reports
//! - Task creation, transitions and listings
//! - Stats and alert endpoints
//! - Error status mapping

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use agent_dashboard_api::api::build_router;
use chrono::Duration;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for oneshot

async fn setup_app() -> (Router, common::TestApp) {
    let app = common::setup().await;
    (build_router(app.state.clone()), app)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("Request failed");
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };

    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (router, _app) = setup_app().await;

    let (status, body) = send(&router, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));
}

#[tokio::test]
async fn test_list_agents_in_roster_order() {
    let (router, _app) = setup_app().await;

    let (status, body) = send(&router, get("/api/agents")).await;

    assert_eq!(status, StatusCode::OK);
    let agents = body.as_array().unwrap();
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0]["name"], "Chief");
    assert_eq!(agents[1]["name"], "Coder");
    assert_eq!(agents[1]["status"], "unknown");
    assert_eq!(agents[1]["display_name"], "Coder");
    assert_eq!(agents[1]["description"], "Programmer agent, develops code");
}

#[tokio::test]
async fn test_get_agent_not_found() {
    let (router, _app) = setup_app().await;

    let (status, body) = send(&router, get("/api/agents/Designer")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Designer"));
}

#[tokio::test]
async fn test_report_flow() {
    let (router, app) = setup_app().await;

    let (status, body) = send(
        &router,
        post(
            "/api/agents/Coder/report",
            json!({"status": "busy", "task_id": "T-1", "description": "write parser"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "busy");
    assert_eq!(body["current_task_id"], "T-1");

    let (status, body) = send(
        &router,
        get("/api/tasks?agent_name=Coder&state=running"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], "T-1");
    assert_eq!(tasks[0]["description"], "write parser");

    app.clock.advance(Duration::seconds(120));
    let (status, body) = send(&router, get("/api/agents/Coder")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "offline");

    let (status, _) = send(&router, post("/api/agents/Coder/heartbeat", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&router, get("/api/agents/Coder")).await;
    assert_eq!(body["status"], "busy");
}

#[tokio::test]
async fn test_report_unknown_agent_is_bad_request() {
    let (router, _app) = setup_app().await;

    let (status, _) = send(
        &router,
        post("/api/agents/Designer/report", json!({"status": "online"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_task_lifecycle_over_http() {
    let (router, _app) = setup_app().await;

    let (status, task) = send(
        &router,
        post("/api/agents/Chief/tasks", json!({"description": "plan"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["state"], "pending");
    let id = task["id"].as_str().unwrap().to_string();

    // Second active task conflicts
    let (status, _) = send(&router, post("/api/agents/Chief/tasks", json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Skipping running is rejected
    let (status, _) = send(
        &router,
        post(
            &format!("/api/tasks/{}/transition", id),
            json!({"state": "completed"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for state in ["running", "completed"] {
        let (status, body) = send(
            &router,
            post(
                &format!("/api/tasks/{}/transition", id),
                json!({"state": state, "result": "done"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], state);
    }

    let (status, body) = send(&router, get(&format!("/api/tasks/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "done");
    assert!(body["ended_at"].is_string());

    let (status, body) = send(&router, get("/api/tasks/history?window=all")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tasks"].as_array().unwrap().len(), 1);

    let (status, body) = send(&router, get("/api/stats?window=all")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agents"][0]["name"], "Chief");
    assert_eq!(body["agents"][0]["completed"], 1);
    assert_eq!(body["completion_rate"], 1.0);
}

#[tokio::test]
async fn test_task_details_and_token_usage() {
    let (router, _app) = setup_app().await;

    let (status, task) = send(
        &router,
        post(
            "/api/agents/Coder/report",
            json!({
                "status": "busy",
                "task_id": "T-9",
                "title": "Parser rewrite",
                "priority": "urgent",
                "requester": "Chief"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["current_task_id"], "T-9");

    let (status, body) = send(&router, get("/api/tasks/T-9")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Parser rewrite");
    assert_eq!(body["priority"], "urgent");
    assert_eq!(body["requester"], "Chief");
    assert_eq!(body["total_tokens"], 0);

    let (status, body) = send(
        &router,
        post(
            "/api/tasks/T-9/transition",
            json!({"state": "completed", "input_tokens": 900, "output_tokens": 100}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input_tokens"], 900);
    assert_eq!(body["total_tokens"], 1000);

    let (status, body) = send(&router, get("/api/stats?window=all")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running_tasks"], 0);
    assert_eq!(body["total_tokens"], 1000);
    assert_eq!(body["output_tokens"], 100);
    assert_eq!(body["agents"][1]["total_tokens"], 1000);
    assert_eq!(body["active_agents"], 0);
    assert_eq!(body["total_alerts"], 0);

    // Unknown priorities are rejected on the request path
    let (status, _) = send(
        &router,
        post("/api/agents/Chief/tasks", json!({"priority": "whenever"})),
    )
    .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let (router, _app) = setup_app().await;

    let (status, _) = send(&router, get("/api/tasks/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &router,
        post("/api/tasks/nope/transition", json!({"state": "running"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_query_parameters() {
    let (router, _app) = setup_app().await;

    for uri in [
        "/api/tasks?state=sleeping",
        "/api/tasks?since=yesterday",
        "/api/tasks?agent_name=Designer",
        "/api/stats?window=3w",
        "/api/tasks/history?until=later",
        "/api/stats?window=100000000d",
        "/api/tasks/history?window=9223372036854775807m",
    ] {
        let (status, _) = send(&router, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn test_task_page_clamps_limit() {
    let (router, _app) = setup_app().await;

    let (status, body) = send(&router, get("/api/tasks?limit=10000&offset=-5")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 500);
    assert_eq!(body["offset"], 0);
}

#[tokio::test]
async fn test_default_stats_window() {
    let (router, _app) = setup_app().await;

    let (status, body) = send(&router, get("/api/stats")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["window"]["start"].is_string());
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_alert_endpoints() {
    let (router, app) = setup_app().await;

    send(
        &router,
        post("/api/agents/Coder/report", json!({"status": "idle"})),
    )
    .await;
    app.clock.advance(Duration::minutes(5));

    let (status, body) = send(&router, post("/api/alerts/check", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["kind"], "agent_offline");

    let (status, body) = send(&router, get("/api/alerts?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["severity"], "warning");
}

#[tokio::test]
async fn test_sync_requires_configured_file() {
    let (router, _app) = setup_app().await;

    let (status, _) = send(&router, post("/api/sync", json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sync_endpoint_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("active-tasks.json");
    std::fs::write(
        &path,
        r#"{"tasks": [{"id": "f-1", "title": "triage", "status": "in_progress", "assignee": "Chief"}]}"#,
    )
    .unwrap();

    let app = common::setup_with(common::test_config(Some(path))).await;
    let router = build_router(app.state.clone());

    let (status, body) = send(&router, post("/api/sync", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);
    assert_eq!(body["changed"], 1);

    let (_, agent) = send(&router, get("/api/agents/Chief")).await;
    assert_eq!(agent["status"], "busy");
    assert_eq!(agent["current_task_id"], "f-1");
}
