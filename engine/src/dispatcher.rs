//! Dispatch loop
//!
//! One tick selects every PENDING event that is due and walks it through:
//!
//! ```text
//! budget check ──fail──► FAILED
//!      │
//! consistency ──no───► CANCELED      (error: left PENDING for next tick)
//!      │
//! throttle ──full───► PENDING, run_at += postpone period
//!      │
//! claim PENDING → RUNNING ──lost──► skipped
//!      │
//! handler ─► policy ─► RUNNING → COMPLETED | FAILED | PENDING (retry)
//!                       + follow-up publishes, one transaction
//!                       (store error: RUNNING → retry or FAILED, no follow-ups)
//! ```
//!
//! An import announcement that ends FAILED or CANCELED takes its corpus
//! import row to FAILED in the same transaction, so the next scan reports
//! the folder again.
//!
//! Events are processed sequentially in `run_at` order. A failure on one
//! event is counted and logged; the rest of the tick goes on.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::consistency::{Consistency, ConsistencyRegistry};
use crate::database::{CorpusImportStatus, Database, EventQuery};
use crate::events::{
    EventPayload, PublishData, ScheduledEvent, ScheduledEventStatus, ScheduledEventType,
};
use crate::handlers::{HandlerOutcome, HandlerRegistry};
use crate::policy::{RetryPolicy, Transition};
use crate::throttle::ConcurrencyThrottle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processed {
    Completed,
    Retried,
    Failed,
    Postponed,
    Canceled,
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub due: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    pub postponed: usize,
    pub canceled: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl TickReport {
    fn record(&mut self, processed: Processed) {
        match processed {
            Processed::Completed => self.completed += 1,
            Processed::Retried => self.retried += 1,
            Processed::Failed => self.failed += 1,
            Processed::Postponed => self.postponed += 1,
            Processed::Canceled => self.canceled += 1,
            Processed::Skipped => self.skipped += 1,
        }
    }
}

impl From<&Transition> for Processed {
    fn from(transition: &Transition) -> Self {
        match transition {
            Transition::Complete => Processed::Completed,
            Transition::Retry { .. } => Processed::Retried,
            Transition::Fail { .. } => Processed::Failed,
            Transition::Postpone { .. } => Processed::Postponed,
            Transition::Cancel { .. } => Processed::Canceled,
        }
    }
}

pub struct EventDispatcher {
    database: Arc<Database>,
    handlers: HandlerRegistry,
    consistency: ConsistencyRegistry,
    throttle: ConcurrencyThrottle,
    policy: RetryPolicy,
    tick_lock: Mutex<()>,
}

impl EventDispatcher {
    pub fn new(
        database: Arc<Database>,
        handlers: HandlerRegistry,
        consistency: ConsistencyRegistry,
        throttle: ConcurrencyThrottle,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            database,
            handlers,
            consistency,
            throttle,
            policy,
            tick_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Process every due event once. Overlapping ticks are skipped.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickReport> {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            debug!("Previous dispatch tick still running, skipping");
            return Ok(TickReport::default());
        };

        let now = Utc::now();
        let due = self.database.query_events(&EventQuery::due(now)).await?;
        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };

        for event in &due {
            match self.process(event, now).await {
                Ok(processed) => report.record(processed),
                Err(e) => {
                    error!(
                        "Failed to process {} event {}: {}",
                        event.event_type, event.id, e
                    );
                    report.errored += 1;
                }
            }
        }

        if report.due > 0 {
            info!(
                "Dispatch tick: {} due, {} completed, {} retried, {} failed, {} postponed, {} canceled, {} skipped, {} errored",
                report.due,
                report.completed,
                report.retried,
                report.failed,
                report.postponed,
                report.canceled,
                report.skipped,
                report.errored
            );
        }
        Ok(report)
    }

    #[instrument(skip(self, event, now), fields(event_id = %event.id, event_type = %event.event_type))]
    async fn process(&self, event: &ScheduledEvent, now: DateTime<Utc>) -> Result<Processed> {
        if let Some(transition) = self.policy.check_budget(event, now) {
            warn!("Event {} cannot run anymore: {:?}", event.id, transition);
            return self.settle_pending(event, &transition).await;
        }

        if let Consistency::Inconsistent(reason) = self.consistency.check(event).await? {
            info!("Event {} no longer consistent: {}", event.id, reason);
            return self
                .settle_pending(event, &Transition::Cancel { reason })
                .await;
        }

        if let Some(class) = event.event_type.throttle_class() {
            if !self.throttle.admits(class).await? {
                let transition = self.policy.postpone(event, now);
                debug!("Event {} throttled ({:?}), postponing", event.id, class);
                return self.settle_pending(event, &transition).await;
            }
        }

        let Some(handler) = self.handlers.get(event.event_type) else {
            let transition = Transition::Fail {
                reason: format!("no handler registered for {}", event.event_type),
            };
            error!("Event {}: {:?}", event.id, transition);
            return self.settle_pending(event, &transition).await;
        };

        if !self.database.claim_event(event.id).await? {
            debug!("Event {} claimed elsewhere, skipping", event.id);
            return Ok(Processed::Skipped);
        }
        let running = ScheduledEvent {
            status: ScheduledEventStatus::Running,
            ..event.clone()
        };

        let report = handler.handle(&running).await;
        let transition = self
            .policy
            .after_outcome(&running, &report.outcome, Utc::now());
        debug!("Event {} outcome {:?} -> {:?}", event.id, report.outcome, transition);

        let applied = match self
            .finish(&running, ScheduledEventStatus::Running, &transition, &report.follow_ups)
            .await
        {
            Ok(applied) => applied,
            Err(e) => {
                self.release_claim(&running, &e).await;
                return Err(e);
            }
        };

        if !applied {
            warn!("Event {} changed while running, outcome dropped", event.id);
            return Ok(Processed::Skipped);
        }

        if let Transition::Fail { reason } = &transition {
            warn!("Event {} failed: {}", event.id, reason);
        }
        Ok(Processed::from(&transition))
    }

    /// Apply a transition to an event that was never claimed
    async fn settle_pending(
        &self,
        event: &ScheduledEvent,
        transition: &Transition,
    ) -> Result<Processed> {
        let applied = self
            .finish(event, ScheduledEventStatus::Pending, transition, &[])
            .await?;

        if applied {
            Ok(Processed::from(transition))
        } else {
            Ok(Processed::Skipped)
        }
    }

    /// Guarded transition plus its side effects in one transaction.
    /// False when the event was no longer in `from`; nothing is written then.
    async fn finish(
        &self,
        event: &ScheduledEvent,
        from: ScheduledEventStatus,
        transition: &Transition,
        follow_ups: &[PublishData],
    ) -> Result<bool> {
        let mut tx = self.database.begin().await?;
        let applied =
            Database::transition_event_in(&mut tx, event.id, from, &transition.to_update()).await?;

        if !applied {
            // Canceled or superseded in the meantime
            tx.rollback().await?;
            return Ok(false);
        }

        release_import_in(&mut tx, event, transition).await?;
        for follow_up in follow_ups {
            Database::publish_event_in(&mut tx, follow_up).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    /// Best effort: the outcome could not be stored, treat the attempt as a
    /// retryable failure so the event does not stay RUNNING
    async fn release_claim(&self, running: &ScheduledEvent, cause: &anyhow::Error) {
        let outcome =
            HandlerOutcome::RetryableFailure(format!("failed to record outcome: {}", cause));
        let fallback = self.policy.after_outcome(running, &outcome, Utc::now());

        match self
            .finish(running, ScheduledEventStatus::Running, &fallback, &[])
            .await
        {
            Ok(true) => warn!(
                "Event {} released after store error: {:?}",
                running.id, fallback
            ),
            Ok(false) => debug!("Event {} already left RUNNING", running.id),
            Err(e) => error!(
                "Event {} stays RUNNING, release failed too: {}",
                running.id, e
            ),
        }
    }
}

/// A dead import announcement hands its folder back to the scanner
async fn release_import_in(
    conn: &mut SqliteConnection,
    event: &ScheduledEvent,
    transition: &Transition,
) -> Result<()> {
    if event.event_type != ScheduledEventType::ImportDetected
        || !matches!(transition, Transition::Fail { .. } | Transition::Cancel { .. })
    {
        return Ok(());
    }
    let Ok(EventPayload::ImportDetected(data)) = event.payload() else {
        return Ok(());
    };

    if Database::set_corpus_import_status_in(
        conn,
        data.import_id,
        CorpusImportStatus::Detected,
        CorpusImportStatus::Failed,
    )
    .await?
    {
        info!(
            "Corpus import {} ({}) marked FAILED, folder will be reported again",
            data.import_id, data.folder
        );
    }
    Ok(())
}
