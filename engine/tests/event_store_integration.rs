//! Integration tests for the event store
//!
//! Publish with identity dedup, guarded transitions, queries, manual
//! cancellation and the startup re-arm, on in-memory SQLite.

mod common;

use chrono::{Duration, Utc};
use common::fixtures::*;
use uuid::Uuid;

use engine::constants::identity::{CHECK_TASKS_KEY, HOUSEKEEPING_KEY_TYPE, SYSTEM_CREATOR};
use engine::database::{Database, EventOrder, EventQuery, EventUpdate, SUPERSEDED};
use engine::errors::StoreError;
use engine::events::{
    CheckTasksData, EventPayload, PublishData, ScheduledEventStatus, ScheduledEventType,
};

fn housekeeping(run_at: chrono::DateTime<Utc>) -> PublishData {
    PublishData::from_payload(
        &EventPayload::CheckRunningTasks(CheckTasksData::default()),
        CHECK_TASKS_KEY,
        HOUSEKEEPING_KEY_TYPE,
        run_at,
        SYSTEM_CREATOR,
    )
    .unwrap()
}

#[tokio::test]
async fn test_publish_creates_pending_event() {
    let db = TestDatabase::new().await.unwrap();
    let request_id = Uuid::new_v4();

    let event = db
        .database()
        .publish_event(&run_training(request_id))
        .await
        .unwrap();

    assert_eq!(event.status, ScheduledEventStatus::Pending);
    assert_eq!(event.event_type, ScheduledEventType::RunTraining);
    assert_eq!(event.key, request_id.to_string());
    assert_eq!(event.retry_count, 0);
    assert!(event.last_error.is_none());

    let stored = db.database().get_event(event.id).await.unwrap().unwrap();
    assert_eq!(stored.id, event.id);
    assert_eq!(stored.data, event.data);
    assert_eq!(stored.run_at.timestamp_millis(), event.run_at.timestamp_millis());
}

#[tokio::test]
async fn test_republish_supersedes_active_event_of_same_identity() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();

    let first = database.publish_event(&housekeeping(Utc::now())).await.unwrap();
    let second = database.publish_event(&housekeeping(Utc::now())).await.unwrap();

    let first = database.get_event(first.id).await.unwrap().unwrap();
    assert_eq!(first.status, ScheduledEventStatus::Canceled);
    assert_eq!(first.last_error.as_deref(), Some(SUPERSEDED));

    let active = database
        .query_events(
            &EventQuery::new()
                .event_type(ScheduledEventType::CheckRunningTasks)
                .key(CHECK_TASKS_KEY)
                .key_type(HOUSEKEEPING_KEY_TYPE)
                .active(),
        )
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);
}

#[tokio::test]
async fn test_publish_supersedes_running_event() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();

    let running = database.publish_event(&housekeeping(Utc::now())).await.unwrap();
    assert!(database.claim_event(running.id).await.unwrap());

    database.publish_event(&housekeeping(Utc::now())).await.unwrap();

    let running = database.get_event(running.id).await.unwrap().unwrap();
    assert_eq!(running.status, ScheduledEventStatus::Canceled);
}

#[tokio::test]
async fn test_publish_does_not_touch_other_identities() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();

    let a = database.publish_event(&run_training(Uuid::new_v4())).await.unwrap();
    let b = database.publish_event(&run_training(Uuid::new_v4())).await.unwrap();
    // Same key, other type
    let reset = database
        .publish_event(&reset_model(
            a.key.parse().unwrap(),
            "model-a",
        ))
        .await
        .unwrap();

    for id in [a.id, b.id, reset.id] {
        let event = database.get_event(id).await.unwrap().unwrap();
        assert_eq!(event.status, ScheduledEventStatus::Pending);
    }
}

#[tokio::test]
async fn test_terminal_events_do_not_block_publish() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();

    let done = database.publish_event(&housekeeping(Utc::now())).await.unwrap();
    assert!(database.claim_event(done.id).await.unwrap());
    assert!(database
        .transition_event(done.id, ScheduledEventStatus::Running, &EventUpdate::completed())
        .await
        .unwrap());

    let next = database.publish_event(&housekeeping(Utc::now())).await.unwrap();

    let done = database.get_event(done.id).await.unwrap().unwrap();
    assert_eq!(done.status, ScheduledEventStatus::Completed);
    assert_eq!(
        database.get_event(next.id).await.unwrap().unwrap().status,
        ScheduledEventStatus::Pending
    );
}

#[tokio::test]
async fn test_unique_index_rejects_second_active_identity() {
    let db = TestDatabase::new().await.unwrap();
    let event = db
        .database()
        .publish_event(&housekeeping(Utc::now()))
        .await
        .unwrap();

    // Bypass publish: a raw duplicate insert must hit the partial unique index
    let result = sqlx::query(
        r#"
        INSERT INTO scheduled_events
        (id, event_type, event_key, key_type, data, status, run_at_ms, retry_count,
         last_error, creator_id, created_at_ms, updated_at_ms)
        VALUES (?, ?, ?, ?, '{}', 'PENDING', 0, 0, NULL, ?, 0, 0)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(event.event_type.as_str())
    .bind(&event.key)
    .bind(&event.key_type)
    .bind(SYSTEM_CREATOR.to_string())
    .execute(db.pool())
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_claim_is_guarded() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();
    let event = database.publish_event(&housekeeping(Utc::now())).await.unwrap();

    assert!(database.claim_event(event.id).await.unwrap());
    assert!(!database.claim_event(event.id).await.unwrap());
    assert!(!database.claim_event(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn test_transition_never_moves_run_at_backwards() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();
    let run_at = Utc::now() + Duration::hours(1);
    let event = database.publish_event(&housekeeping(run_at)).await.unwrap();

    let applied = database
        .transition_event(
            event.id,
            ScheduledEventStatus::Pending,
            &EventUpdate::rescheduled(Utc::now()),
        )
        .await
        .unwrap();
    assert!(applied);

    let stored = database.get_event(event.id).await.unwrap().unwrap();
    assert_eq!(stored.run_at.timestamp_millis(), run_at.timestamp_millis());
}

#[tokio::test]
async fn test_due_query_orders_by_run_at_then_creation() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();
    let now = Utc::now();

    let later = database
        .publish_event(&PublishData {
            run_at: now - Duration::seconds(5),
            ..run_training(Uuid::new_v4())
        })
        .await
        .unwrap();
    let earlier = database
        .publish_event(&PublishData {
            run_at: now - Duration::seconds(30),
            ..run_training(Uuid::new_v4())
        })
        .await
        .unwrap();
    let future = database
        .publish_event(&PublishData {
            run_at: now + Duration::minutes(5),
            ..run_training(Uuid::new_v4())
        })
        .await
        .unwrap();

    let due = database.query_events(&EventQuery::due(now)).await.unwrap();
    let ids: Vec<Uuid> = due.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![earlier.id, later.id]);
    assert!(!ids.contains(&future.id));

    let newest = database
        .query_events(&EventQuery::new().order(EventOrder::NewestFirst).limit(1))
        .await
        .unwrap();
    assert_eq!(newest.len(), 1);
    assert_eq!(newest[0].id, future.id);
}

#[tokio::test]
async fn test_count_and_delete_events() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();
    for _ in 0..3 {
        database.publish_event(&run_training(Uuid::new_v4())).await.unwrap();
    }
    database.publish_event(&housekeeping(Utc::now())).await.unwrap();

    let training = EventQuery::new().event_type(ScheduledEventType::RunTraining);
    assert_eq!(database.count_events(&training).await.unwrap(), 3);
    assert_eq!(database.count_events(&EventQuery::new()).await.unwrap(), 4);

    assert_eq!(database.delete_events(&training).await.unwrap(), 3);
    assert_eq!(database.count_events(&EventQuery::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_cancel_event() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();
    let event = database.publish_event(&run_training(Uuid::new_v4())).await.unwrap();

    let canceled = database.cancel_event(event.id, "operator").await.unwrap();
    assert_eq!(canceled.status, ScheduledEventStatus::Canceled);
    assert_eq!(canceled.last_error.as_deref(), Some("operator"));

    // Terminal events are never resurrected
    let again = database.cancel_event(event.id, "operator").await.unwrap_err();
    assert!(matches!(
        again.downcast_ref::<StoreError>(),
        Some(StoreError::AlreadyTerminal { .. })
    ));

    let missing = database
        .cancel_event(Uuid::new_v4(), "operator")
        .await
        .unwrap_err();
    assert!(matches!(
        missing.downcast_ref::<StoreError>(),
        Some(StoreError::EventNotFound { .. })
    ));
}

#[tokio::test]
async fn test_cancel_events_by_identity() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();
    let event = database.publish_event(&housekeeping(Utc::now())).await.unwrap();

    let canceled = database
        .cancel_events(
            ScheduledEventType::CheckRunningTasks,
            CHECK_TASKS_KEY,
            HOUSEKEEPING_KEY_TYPE,
            "maintenance",
        )
        .await
        .unwrap();
    assert_eq!(canceled, 1);
    assert_eq!(
        database.get_event(event.id).await.unwrap().unwrap().status,
        ScheduledEventStatus::Canceled
    );
}

#[tokio::test]
async fn test_rearm_leaves_exactly_one_active_check() {
    let db = TestDatabase::new().await.unwrap();
    let database = db.database();

    let stale = database
        .publish_event(&housekeeping(Utc::now() + Duration::hours(2)))
        .await
        .unwrap();
    let rearmed = database.rearm_running_tasks_check().await.unwrap();
    let rearmed_again = database.rearm_running_tasks_check().await.unwrap();

    assert!(database.get_event(stale.id).await.unwrap().is_none());
    assert!(database.get_event(rearmed.id).await.unwrap().is_none());

    let active = database
        .query_events(
            &EventQuery::new()
                .event_type(ScheduledEventType::CheckRunningTasks)
                .active(),
        )
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, rearmed_again.id);
    assert_eq!(active[0].creator_id, SYSTEM_CREATOR);
    assert!(active[0].run_at <= Utc::now());
}

#[tokio::test]
async fn test_restart_requeues_interrupted_events() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("data").join("events.db");
    let path = path.to_str().unwrap();

    let id = {
        let database = Database::new(path).await.unwrap();
        let event = database.publish_event(&housekeeping(Utc::now())).await.unwrap();
        assert!(database.claim_event(event.id).await.unwrap());
        database.pool().close().await;
        event.id
    };

    let database = Database::new(path).await.unwrap();
    let event = database.get_event(id).await.unwrap().unwrap();
    assert_eq!(event.status, ScheduledEventStatus::Pending);
}
