//! Scheduled event store.
//!
//! Every mutation of an existing event is a guarded update
//! (`WHERE id = ? AND status = ?`); the returned flag tells the caller whether
//! it won the transition.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::records::{from_millis, parse_uuid, to_millis};
use super::Database;
use crate::constants::identity::SYSTEM_CREATOR;
use crate::errors::StoreError;
use crate::events::{
    CheckTasksData, EventPayload, PublishData, ScheduledEvent, ScheduledEventStatus,
    ScheduledEventType,
};

const EVENT_COLUMNS: &str = "id, event_type, event_key, key_type, data, status, run_at_ms, \
     retry_count, last_error, creator_id, created_at_ms, updated_at_ms";

pub const SUPERSEDED: &str = "superseded";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventOrder {
    /// `run_at` then creation order, the dispatch order
    #[default]
    DueFirst,
    NewestFirst,
}

/// Filter over scheduled events; empty lists match everything
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub ids: Vec<Uuid>,
    pub types: Vec<ScheduledEventType>,
    pub statuses: Vec<ScheduledEventStatus>,
    pub keys: Vec<String>,
    pub key_types: Vec<String>,
    pub due_before: Option<DateTime<Utc>>,
    pub order: EventOrder,
    pub limit: Option<i64>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// PENDING events whose `run_at` has passed
    pub fn due(now: DateTime<Utc>) -> Self {
        Self::new()
            .status(ScheduledEventStatus::Pending)
            .due_before(now)
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.ids.push(id);
        self
    }

    pub fn event_type(mut self, event_type: ScheduledEventType) -> Self {
        self.types.push(event_type);
        self
    }

    pub fn status(mut self, status: ScheduledEventStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn active(mut self) -> Self {
        self.statuses.extend(ScheduledEventStatus::ACTIVE);
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn key_type(mut self, key_type: impl Into<String>) -> Self {
        self.key_types.push(key_type.into());
        self
    }

    pub fn due_before(mut self, instant: DateTime<Utc>) -> Self {
        self.due_before = Some(instant);
        self
    }

    pub fn order(mut self, order: EventOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn push_filters(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE 1 = 1");

        if !self.ids.is_empty() {
            builder.push(" AND id IN (");
            let mut list = builder.separated(", ");
            for id in &self.ids {
                list.push_bind(id.to_string());
            }
            list.push_unseparated(")");
        }
        if !self.types.is_empty() {
            builder.push(" AND event_type IN (");
            let mut list = builder.separated(", ");
            for event_type in &self.types {
                list.push_bind(event_type.as_str());
            }
            list.push_unseparated(")");
        }
        if !self.statuses.is_empty() {
            builder.push(" AND status IN (");
            let mut list = builder.separated(", ");
            for status in &self.statuses {
                list.push_bind(status.as_str());
            }
            list.push_unseparated(")");
        }
        if !self.keys.is_empty() {
            builder.push(" AND event_key IN (");
            let mut list = builder.separated(", ");
            for key in &self.keys {
                list.push_bind(key.clone());
            }
            list.push_unseparated(")");
        }
        if !self.key_types.is_empty() {
            builder.push(" AND key_type IN (");
            let mut list = builder.separated(", ");
            for key_type in &self.key_types {
                list.push_bind(key_type.clone());
            }
            list.push_unseparated(")");
        }
        if let Some(instant) = self.due_before {
            builder.push(" AND run_at_ms <= ");
            builder.push_bind(to_millis(instant));
        }
    }

    fn push_order_and_limit(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self.order {
            EventOrder::DueFirst => {
                builder.push(" ORDER BY run_at_ms ASC, created_at_ms ASC, rowid ASC");
            }
            EventOrder::NewestFirst => {
                builder.push(" ORDER BY created_at_ms DESC, rowid DESC");
            }
        }
        if let Some(limit) = self.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }
    }
}

/// Target state of a guarded transition
#[derive(Debug, Clone, PartialEq)]
pub struct EventUpdate {
    pub status: ScheduledEventStatus,
    pub run_at: Option<DateTime<Utc>>,
    pub retry_count: Option<u32>,
    pub last_error: Option<String>,
}

impl EventUpdate {
    pub fn status(status: ScheduledEventStatus) -> Self {
        Self {
            status,
            run_at: None,
            retry_count: None,
            last_error: None,
        }
    }

    pub fn completed() -> Self {
        Self::status(ScheduledEventStatus::Completed)
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::status(ScheduledEventStatus::Failed).with_error(reason)
    }

    pub fn canceled(reason: impl Into<String>) -> Self {
        Self::status(ScheduledEventStatus::Canceled).with_error(reason)
    }

    pub fn rescheduled(run_at: DateTime<Utc>) -> Self {
        Self {
            run_at: Some(run_at),
            ..Self::status(ScheduledEventStatus::Pending)
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn with_error(mut self, reason: impl Into<String>) -> Self {
        self.last_error = Some(reason.into());
        self
    }
}

fn event_from_row(row: &SqliteRow) -> Result<ScheduledEvent> {
    let id: String = row.try_get("id")?;
    let event_type: String = row.try_get("event_type")?;
    let status: String = row.try_get("status")?;
    let creator_id: String = row.try_get("creator_id")?;
    let retry_count: i64 = row.try_get("retry_count")?;

    Ok(ScheduledEvent {
        id: parse_uuid("scheduled_events.id", &id)?,
        event_type: event_type.parse()?,
        key: row.try_get("event_key")?,
        key_type: row.try_get("key_type")?,
        data: row.try_get("data")?,
        status: status.parse()?,
        run_at: from_millis(row.try_get("run_at_ms")?)?,
        retry_count: u32::try_from(retry_count).map_err(|_| StoreError::Corrupt {
            field: "scheduled_events.retry_count".to_string(),
            value: retry_count.to_string(),
        })?,
        last_error: row.try_get("last_error")?,
        creator_id: parse_uuid("scheduled_events.creator_id", &creator_id)?,
        created_at: from_millis(row.try_get("created_at_ms")?)?,
        updated_at: from_millis(row.try_get("updated_at_ms")?)?,
    })
}

impl Database {
    /// Publish inside the caller's transaction.
    ///
    /// Active events sharing the identity are canceled first, so the new
    /// event is the only PENDING/RUNNING one for its (type, key, key_type).
    pub async fn publish_event_in(
        conn: &mut SqliteConnection,
        data: &PublishData,
    ) -> Result<ScheduledEvent> {
        let now = Utc::now();

        let superseded = sqlx::query(
            r#"
            UPDATE scheduled_events
            SET status = 'CANCELED',
                last_error = ?,
                updated_at_ms = ?
            WHERE event_type = ? AND event_key = ? AND key_type = ?
              AND status IN ('PENDING', 'RUNNING')
            "#,
        )
        .bind(SUPERSEDED)
        .bind(to_millis(now))
        .bind(data.event_type.as_str())
        .bind(&data.key)
        .bind(&data.key_type)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if superseded > 0 {
            info!(
                "Superseded {} active {} event(s) for key {}/{}",
                superseded, data.event_type, data.key_type, data.key
            );
        }

        let event = ScheduledEvent {
            id: Uuid::new_v4(),
            event_type: data.event_type,
            key: data.key.clone(),
            key_type: data.key_type.clone(),
            data: data.data.clone(),
            status: ScheduledEventStatus::Pending,
            run_at: data.run_at,
            retry_count: 0,
            last_error: None,
            creator_id: data.creator_id,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO scheduled_events (
                id, event_type, event_key, key_type, data, status, run_at_ms,
                retry_count, last_error, creator_id, created_at_ms, updated_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, NULL, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.event_type.as_str())
        .bind(&event.key)
        .bind(&event.key_type)
        .bind(&event.data)
        .bind(event.status.as_str())
        .bind(to_millis(event.run_at))
        .bind(event.creator_id.to_string())
        .bind(to_millis(now))
        .bind(to_millis(now))
        .execute(&mut *conn)
        .await?;

        debug!(
            "Published {} event {} (key {}/{}) due at {}",
            event.event_type, event.id, event.key_type, event.key, event.run_at
        );
        Ok(event)
    }

    pub async fn publish_event(&self, data: &PublishData) -> Result<ScheduledEvent> {
        let mut tx = self.pool.begin().await?;
        let event = Self::publish_event_in(&mut tx, data).await?;
        tx.commit().await?;
        Ok(event)
    }

    pub async fn query_events(&self, query: &EventQuery) -> Result<Vec<ScheduledEvent>> {
        let mut conn = self.pool.acquire().await?;
        Self::query_events_in(&mut conn, query).await
    }

    pub async fn query_events_in(
        conn: &mut SqliteConnection,
        query: &EventQuery,
    ) -> Result<Vec<ScheduledEvent>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM scheduled_events",
            EVENT_COLUMNS
        ));
        query.push_filters(&mut builder);
        query.push_order_and_limit(&mut builder);

        let rows = builder.build().fetch_all(&mut *conn).await?;
        rows.iter().map(event_from_row).collect()
    }

    pub async fn count_events(&self, query: &EventQuery) -> Result<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM scheduled_events");
        query.push_filters(&mut builder);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn delete_events(&self, query: &EventQuery) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        Self::delete_events_in(&mut conn, query).await
    }

    pub async fn delete_events_in(conn: &mut SqliteConnection, query: &EventQuery) -> Result<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM scheduled_events");
        query.push_filters(&mut builder);

        let deleted = builder.build().execute(&mut *conn).await?.rows_affected();
        debug!("Deleted {} scheduled events", deleted);
        Ok(deleted)
    }

    pub async fn get_event(&self, id: Uuid) -> Result<Option<ScheduledEvent>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM scheduled_events WHERE id = ?",
            EVENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    /// Guarded `PENDING -> RUNNING`; false when another pass got there first
    pub async fn claim_event(&self, id: Uuid) -> Result<bool> {
        self.transition_event(
            id,
            ScheduledEventStatus::Pending,
            &EventUpdate::status(ScheduledEventStatus::Running),
        )
        .await
    }

    pub async fn transition_event(
        &self,
        id: Uuid,
        from: ScheduledEventStatus,
        update: &EventUpdate,
    ) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Self::transition_event_in(&mut conn, id, from, update).await
    }

    /// Guarded transition; `run_at` never moves backwards
    pub async fn transition_event_in(
        conn: &mut SqliteConnection,
        id: Uuid,
        from: ScheduledEventStatus,
        update: &EventUpdate,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_events
            SET status = ?,
                run_at_ms = MAX(run_at_ms, COALESCE(?, run_at_ms)),
                retry_count = COALESCE(?, retry_count),
                last_error = COALESCE(?, last_error),
                updated_at_ms = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(update.status.as_str())
        .bind(update.run_at.map(to_millis))
        .bind(update.retry_count.map(i64::from))
        .bind(&update.last_error)
        .bind(to_millis(Utc::now()))
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;

        let applied = result.rows_affected() == 1;
        if applied {
            debug!("Event {} moved {} -> {}", id, from, update.status);
        } else {
            debug!(
                "Event {} was not {} anymore, {} transition skipped",
                id, from, update.status
            );
        }
        Ok(applied)
    }

    /// Cancel one active event; terminal events are never resurrected
    pub async fn cancel_event(&self, id: Uuid, reason: &str) -> Result<ScheduledEvent> {
        let event = self
            .get_event(id)
            .await?
            .ok_or(StoreError::EventNotFound { id: id.to_string() })?;

        if event.status.is_terminal()
            || !self
                .transition_event(id, event.status, &EventUpdate::canceled(reason))
                .await?
        {
            // Lost a race with the dispatcher; report what is stored now
            let current = self.get_event(id).await?.map(|e| e.status).unwrap_or(event.status);
            return Err(anyhow!(StoreError::AlreadyTerminal {
                id: id.to_string(),
                status: current.to_string(),
            }));
        }

        info!("Canceled {} event {}: {}", event.event_type, id, reason);
        self.get_event(id)
            .await?
            .ok_or_else(|| anyhow!(StoreError::EventNotFound { id: id.to_string() }))
    }

    /// Cancel every active event of one identity, returns how many
    pub async fn cancel_events(
        &self,
        event_type: ScheduledEventType,
        key: &str,
        key_type: &str,
        reason: &str,
    ) -> Result<u64> {
        let canceled = sqlx::query(
            r#"
            UPDATE scheduled_events
            SET status = 'CANCELED',
                last_error = ?,
                updated_at_ms = ?
            WHERE event_type = ? AND event_key = ? AND key_type = ?
              AND status IN ('PENDING', 'RUNNING')
            "#,
        )
        .bind(reason)
        .bind(to_millis(Utc::now()))
        .bind(event_type.as_str())
        .bind(key)
        .bind(key_type)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if canceled > 0 {
            info!(
                "Canceled {} active {} event(s) for key {}/{}",
                canceled, event_type, key_type, key
            );
        }
        Ok(canceled)
    }

    /// Replace any active check-running-tasks event with a fresh one due now.
    ///
    /// Removal and publish share one transaction so a crash in between never
    /// leaves the engine without its housekeeping event.
    pub async fn rearm_running_tasks_check(&self) -> Result<ScheduledEvent> {
        let mut tx = self.pool.begin().await?;

        let removed = Self::delete_events_in(
            &mut tx,
            &EventQuery::new()
                .event_type(ScheduledEventType::CheckRunningTasks)
                .active(),
        )
        .await?;
        if removed > 0 {
            warn!("Removed {} stale check-running-tasks event(s)", removed);
        }

        let data = PublishData::from_payload(
            &EventPayload::CheckRunningTasks(CheckTasksData::default()),
            crate::constants::identity::CHECK_TASKS_KEY,
            crate::constants::identity::HOUSEKEEPING_KEY_TYPE,
            Utc::now(),
            SYSTEM_CREATOR,
        )?;
        let event = Self::publish_event_in(&mut tx, &data).await?;
        tx.commit().await?;

        info!("Armed check-running-tasks event {}", event.id);
        Ok(event)
    }
}
