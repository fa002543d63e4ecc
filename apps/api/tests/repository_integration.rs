//! Integration tests for repository layer
//!
//! These tests verify that the SQLite repository implementations correctly
//! persist agents, tasks and alerts, including transactional commits,
//! immutability of ended tasks and alert deduplication.

use agent_dashboard_api::domain::agent::{AgentRecord, AgentStatus};
use agent_dashboard_api::domain::alert::{AlertDraft, AlertKind, Severity};
use agent_dashboard_api::domain::repositories::{
    AlertRepository, ChangeSet, StateRepository, TaskFilter,
};
use agent_dashboard_api::domain::task::{
    TaskId, TaskPriority, TaskProfile, TaskRecord, TaskState, TokenUsage,
};
use agent_dashboard_api::domain::window::TimeWindow;
use agent_dashboard_api::infrastructure::repositories::{
    SqliteAlertRepository, SqliteStateRepository,
};
use agent_dashboard_api::infrastructure::Database;
use chrono::{DateTime, Duration, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap()
}

/// Set up an in-memory database with the roster agents stored
async fn setup_test_db() -> (Database, SqliteStateRepository) {
    let db = Database::in_memory()
        .await
        .expect("Failed to open in-memory database");
    let repo = SqliteStateRepository::new(db.pool().clone());

    repo.insert_missing_agents(&[AgentRecord::new("Chief", t0()), AgentRecord::new("Coder", t0())])
        .await
        .expect("Failed to insert agents");

    (db, repo)
}

fn created(task: &TaskRecord) -> ChangeSet {
    ChangeSet {
        created: vec![task.clone()],
        ..Default::default()
    }
}

fn updated(task: &TaskRecord) -> ChangeSet {
    ChangeSet {
        updated: vec![task.clone()],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_agent_round_trip() {
    let (_db, repo) = setup_test_db().await;

    let mut coder = repo.find_agent("Coder").await.unwrap().unwrap();
    assert_eq!(coder.status(), AgentStatus::Unknown);

    coder.record_report(
        AgentStatus::Busy,
        Some(TaskId::new("t-1")),
        t0() + Duration::seconds(3),
        t0() + Duration::seconds(4),
    );
    repo.commit(&ChangeSet {
        agent: Some(coder.clone()),
        ..Default::default()
    })
    .await
    .unwrap();

    let stored = repo.find_agent("Coder").await.unwrap().unwrap();
    assert_eq!(stored, coder);
    assert_eq!(stored.last_online_status(), Some(AgentStatus::Busy));
}

#[tokio::test]
async fn test_insert_missing_agents_is_idempotent() {
    let (_db, repo) = setup_test_db().await;

    let mut chief = repo.find_agent("Chief").await.unwrap().unwrap();
    chief.record_report(AgentStatus::Online, None, t0(), t0());
    repo.commit(&ChangeSet {
        agent: Some(chief),
        ..Default::default()
    })
    .await
    .unwrap();

    repo.insert_missing_agents(&[AgentRecord::new("Chief", t0())])
        .await
        .unwrap();

    let agents = repo.find_agents().await.unwrap();
    assert_eq!(agents.len(), 2);
    let chief = repo.find_agent("Chief").await.unwrap().unwrap();
    assert_eq!(chief.status(), AgentStatus::Online);
}

#[tokio::test]
async fn test_ended_tasks_are_not_overwritten() {
    let (_db, repo) = setup_test_db().await;

    let (mut task, _) = TaskRecord::new(TaskId::new("t-1"), "Coder", None, t0());
    repo.commit(&created(&task)).await.unwrap();
    task.transition_to(TaskState::Failed, Some("first".into()), t0())
        .unwrap();
    repo.commit(&updated(&task)).await.unwrap();

    // A second write of an ended row matches nothing and changes nothing
    let mut stale = task.clone();
    stale.record_usage(TokenUsage::new(1, 1));
    let err = repo.commit(&updated(&stale)).await.unwrap_err();
    assert!(matches!(err, sqlx::Error::RowNotFound));

    let stored = repo.find_task(&TaskId::new("t-1")).await.unwrap().unwrap();
    assert_eq!(stored.state(), TaskState::Failed);
    assert_eq!(stored.result(), Some("first"));
    assert_eq!(stored.usage(), TokenUsage::default());
}

#[tokio::test]
async fn test_created_task_never_replaces_another_agents_row() {
    let (_db, repo) = setup_test_db().await;

    let (mut coder_task, _) = TaskRecord::new(TaskId::new("T1"), "Coder", None, t0());
    repo.commit(&created(&coder_task)).await.unwrap();
    coder_task
        .transition_to(TaskState::Running, None, t0() + Duration::seconds(5))
        .unwrap();
    repo.commit(&updated(&coder_task)).await.unwrap();

    let (chief_task, _) = TaskRecord::new(TaskId::new("T1"), "Chief", None, t0());
    let err = repo.commit(&created(&chief_task)).await.unwrap_err();
    match err {
        sqlx::Error::Database(db_err) => assert!(db_err.is_unique_violation()),
        other => panic!("expected unique violation, got {}", other),
    }

    // Nor can an update written under the wrong owner
    let err = repo.commit(&updated(&chief_task)).await.unwrap_err();
    assert!(matches!(err, sqlx::Error::RowNotFound));

    let stored = repo.find_task(&TaskId::new("T1")).await.unwrap().unwrap();
    assert_eq!(stored.agent_name(), "Coder");
    assert_eq!(stored.state(), TaskState::Running);
    assert_eq!(stored.started_at(), Some(t0() + Duration::seconds(5)));
}

#[tokio::test]
async fn test_task_profile_and_usage_round_trip() {
    let (_db, repo) = setup_test_db().await;

    let profile = TaskProfile {
        title: Some("Quarterly report".into()),
        priority: TaskPriority::High,
        requester: Some("Chief".into()),
    };
    let (mut task, _) = TaskRecord::open(
        TaskId::new("r-1"),
        "Coder",
        Some("numbers".into()),
        profile.clone(),
        t0(),
    );
    repo.commit(&created(&task)).await.unwrap();

    task.record_usage(TokenUsage::new(1500, 400));
    repo.commit(&updated(&task)).await.unwrap();

    let stored = repo.find_task(&TaskId::new("r-1")).await.unwrap().unwrap();
    assert_eq!(stored, task);
    assert_eq!(stored.profile(), &profile);
    assert_eq!(stored.usage().total(), 1900);
}

#[tokio::test]
async fn test_second_active_task_violates_unique_index() {
    let (_db, repo) = setup_test_db().await;

    let (first, _) = TaskRecord::new(TaskId::new("a"), "Coder", None, t0());
    let (second, _) = TaskRecord::new(TaskId::new("b"), "Coder", None, t0());
    repo.commit(&created(&first)).await.unwrap();

    let err = repo.commit(&created(&second)).await.unwrap_err();
    match err {
        sqlx::Error::Database(db_err) => assert!(db_err.is_unique_violation()),
        other => panic!("expected unique violation, got {}", other),
    }

    assert!(repo.find_task(&TaskId::new("b")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_commit_is_atomic() {
    let (_db, repo) = setup_test_db().await;

    let (active, _) = TaskRecord::new(TaskId::new("a"), "Coder", None, t0());
    repo.commit(&created(&active)).await.unwrap();

    let mut coder = repo.find_agent("Coder").await.unwrap().unwrap();
    coder.record_report(AgentStatus::Busy, Some(TaskId::new("b")), t0(), t0());
    let (clash, _) = TaskRecord::new(TaskId::new("b"), "Coder", None, t0());

    let result = repo
        .commit(&ChangeSet {
            agent: Some(coder),
            created: vec![clash],
            updated: vec![],
        })
        .await;
    assert!(result.is_err());

    let stored = repo.find_agent("Coder").await.unwrap().unwrap();
    assert_eq!(stored.status(), AgentStatus::Unknown, "agent write rolled back");
}

#[tokio::test]
async fn test_ending_and_opening_in_one_commit() {
    let (_db, repo) = setup_test_db().await;

    let (mut old, _) = TaskRecord::new(TaskId::new("old"), "Coder", None, t0());
    repo.commit(&created(&old)).await.unwrap();

    old.transition_to(TaskState::Failed, None, t0()).unwrap();
    let (new, _) = TaskRecord::new(TaskId::new("new"), "Coder", None, t0());
    repo.commit(&ChangeSet {
        agent: None,
        created: vec![new],
        updated: vec![old],
    })
    .await
    .unwrap();

    let active = repo.find_active_task("Coder").await.unwrap().unwrap();
    assert_eq!(active.id().as_str(), "new");
}

#[tokio::test]
async fn test_task_queries() {
    let (_db, repo) = setup_test_db().await;

    let (mut done, _) = TaskRecord::new(TaskId::new("done"), "Coder", None, t0());
    done.transition_to(TaskState::Running, None, t0()).unwrap();
    done.transition_to(TaskState::Completed, None, t0() + Duration::minutes(10))
        .unwrap();
    let (open, _) = TaskRecord::new(
        TaskId::new("open"),
        "Chief",
        Some("plan".into()),
        t0() + Duration::minutes(1),
    );
    repo.commit(&ChangeSet {
        agent: None,
        created: vec![done, open],
        updated: vec![],
    })
    .await
    .unwrap();

    let active = repo.find_active_tasks().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id().as_str(), "open");

    assert!(repo.find_active_task("Coder").await.unwrap().is_none());
    assert!(repo.find_active_task("Chief").await.unwrap().is_some());

    let ended = repo
        .find_tasks_ended_in(&TimeWindow::between(
            t0() + Duration::minutes(5),
            t0() + Duration::minutes(10),
        ))
        .await
        .unwrap();
    assert_eq!(ended.len(), 1);

    let completed = repo
        .list_tasks(
            &TaskFilter {
                state: Some(TaskState::Completed),
                ..Default::default()
            },
            10,
            0,
        )
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].duration(), Some(Duration::minutes(10)));

    let before_open = repo
        .list_tasks(
            &TaskFilter {
                until: Some(t0()),
                ..Default::default()
            },
            10,
            0,
        )
        .await
        .unwrap();
    assert_eq!(before_open.len(), 1);
    assert_eq!(before_open[0].id().as_str(), "done");
}

#[tokio::test]
async fn test_snapshot_reads_window_tasks_and_agents_together() {
    let (_db, repo) = setup_test_db().await;

    let (mut early, _) = TaskRecord::new(TaskId::new("early"), "Coder", None, t0());
    early.transition_to(TaskState::Failed, None, t0()).unwrap();
    let (mut inside, _) = TaskRecord::new(TaskId::new("inside"), "Coder", None, t0());
    inside
        .transition_to(TaskState::Failed, None, t0() + Duration::hours(2))
        .unwrap();
    let (open, _) = TaskRecord::new(TaskId::new("open"), "Chief", None, t0());
    let (late, _) = TaskRecord::new(
        TaskId::new("late"),
        "Coder",
        None,
        t0() + Duration::hours(5),
    );
    repo.commit(&ChangeSet {
        agent: None,
        created: vec![early, inside, open, late],
        updated: vec![],
    })
    .await
    .unwrap();

    let window = TimeWindow::between(t0() + Duration::hours(1), t0() + Duration::hours(3));
    let snapshot = repo.snapshot(&window).await.unwrap();

    let mut ids: Vec<&str> = snapshot.tasks.iter().map(|t| t.id().as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["inside", "open"]);
    assert_eq!(snapshot.agents.len(), 2);
}

#[tokio::test]
async fn test_alert_dedup_and_order() {
    let (db, _repo) = setup_test_db().await;
    let alerts = SqliteAlertRepository::new(db.pool().clone());

    let draft = |key: &str| AlertDraft {
        dedup_key: key.to_string(),
        kind: AlertKind::TaskFailure,
        severity: Severity::Error,
        title: format!("Task failed: {}", key),
        message: None,
        agent_name: Some("Coder".into()),
        task_id: Some(key.to_string()),
    };

    let first = alerts.record(&draft("task_failure:a"), t0()).await.unwrap();
    assert!(first.is_some());
    let duplicate = alerts.record(&draft("task_failure:a"), t0()).await.unwrap();
    assert!(duplicate.is_none());
    alerts
        .record(&draft("task_failure:b"), t0() + Duration::seconds(1))
        .await
        .unwrap();

    let recent = alerts.recent(10).await.unwrap();
    let keys: Vec<&str> = recent.iter().map(|a| a.dedup_key.as_str()).collect();
    assert_eq!(keys, vec!["task_failure:b", "task_failure:a"]);

    assert_eq!(alerts.recent(1).await.unwrap().len(), 1);

    assert_eq!(alerts.count_in(&TimeWindow::all()).await.unwrap(), 2);
    let first_only = TimeWindow::between(t0(), t0());
    assert_eq!(alerts.count_in(&first_only).await.unwrap(), 1);
}
