//! Retry / backoff policy
//!
//! Pure decisions over an event's retry count and age. Nothing here touches
//! the store; the dispatcher turns a [`Transition`] into a guarded update.
//!
//! ```text
//! retry_count   delay (base = 15s, max = 600s)
//!      0            15s
//!      1            30s
//!      2            60s
//!      5           480s
//!     >5           600s (capped)
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::constants::limits::MAX_DELAY_SECONDS;
use crate::database::EventUpdate;
use crate::events::{ScheduledEvent, ScheduledEventStatus};
use crate::handlers::HandlerOutcome;

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Complete,
    Retry {
        next_run_at: DateTime<Utc>,
        retry_count: u32,
        error: String,
    },
    Fail {
        reason: String,
    },
    Postpone {
        next_run_at: DateTime<Utc>,
    },
    Cancel {
        reason: String,
    },
}

impl Transition {
    pub fn status(&self) -> ScheduledEventStatus {
        match self {
            Transition::Complete => ScheduledEventStatus::Completed,
            Transition::Retry { .. } | Transition::Postpone { .. } => ScheduledEventStatus::Pending,
            Transition::Fail { .. } => ScheduledEventStatus::Failed,
            Transition::Cancel { .. } => ScheduledEventStatus::Canceled,
        }
    }

    pub fn to_update(&self) -> EventUpdate {
        match self {
            Transition::Complete => EventUpdate::completed(),
            Transition::Retry {
                next_run_at,
                retry_count,
                error,
            } => EventUpdate::rescheduled(*next_run_at)
                .with_retry_count(*retry_count)
                .with_error(error.clone()),
            Transition::Fail { reason } => EventUpdate::failed(reason.clone()),
            Transition::Postpone { next_run_at } => EventUpdate::rescheduled(*next_run_at),
            Transition::Cancel { reason } => EventUpdate::canceled(reason.clone()),
        }
    }
}

/// Seconds as a `Duration`, saturating at [`MAX_DELAY_SECONDS`]
pub fn bounded_seconds(seconds: u64) -> Duration {
    i64::try_from(seconds.min(MAX_DELAY_SECONDS))
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or_else(Duration::zero)
}

/// `from + delay`, or `from` itself when the sum leaves chrono's range
fn shifted(from: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    from.checked_add_signed(delay).unwrap_or(from)
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retry_threshold: u32,
    pub base_retry_delay_seconds: u64,
    pub max_retry_delay_seconds: u64,
    pub too_old_to_handle_seconds: u64,
    pub postpone_period_seconds: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry_threshold: config.event_scheduler.retry_threshold,
            base_retry_delay_seconds: config.event_scheduler.base_retry_delay_seconds,
            max_retry_delay_seconds: config.event_scheduler.max_retry_delay_seconds,
            too_old_to_handle_seconds: config.event_scheduler.too_old_to_handle_seconds,
            postpone_period_seconds: config.events.run_training.postpone_period_in_seconds,
        }
    }

    /// `base * 2^retry_count`, capped at the maximum, never below one second
    pub fn retry_delay(&self, retry_count: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry_count);
        let seconds = self
            .base_retry_delay_seconds
            .saturating_mul(factor)
            .min(self.max_retry_delay_seconds)
            .max(1);
        bounded_seconds(seconds)
    }

    fn is_too_old(&self, event: &ScheduledEvent, now: DateTime<Utc>) -> bool {
        let limit = i64::try_from(self.too_old_to_handle_seconds).unwrap_or(i64::MAX);
        event.age(now).num_seconds() >= limit
    }

    /// Pre-dispatch check; `Some(Fail)` when the event must not run again
    pub fn check_budget(&self, event: &ScheduledEvent, now: DateTime<Utc>) -> Option<Transition> {
        if event.retry_count >= self.retry_threshold {
            return Some(Transition::Fail {
                reason: format!(
                    "retry budget exhausted ({} of {} attempts)",
                    event.retry_count, self.retry_threshold
                ),
            });
        }
        if self.is_too_old(event, now) {
            return Some(Transition::Fail {
                reason: format!(
                    "too old to handle ({}s, limit {}s)",
                    event.age(now).num_seconds(),
                    self.too_old_to_handle_seconds
                ),
            });
        }
        None
    }

    pub fn after_outcome(
        &self,
        event: &ScheduledEvent,
        outcome: &HandlerOutcome,
        now: DateTime<Utc>,
    ) -> Transition {
        match outcome {
            HandlerOutcome::Success => Transition::Complete,
            HandlerOutcome::NonRetryableFailure(message) => Transition::Fail {
                reason: message.clone(),
            },
            HandlerOutcome::RetryableFailure(message) => {
                if event.retry_count >= self.retry_threshold {
                    return Transition::Fail {
                        reason: format!("retry budget exhausted: {}", message),
                    };
                }
                if self.is_too_old(event, now) {
                    return Transition::Fail {
                        reason: format!("too old to handle: {}", message),
                    };
                }
                let delay = self.retry_delay(event.retry_count);
                Transition::Retry {
                    next_run_at: shifted(now.max(event.run_at), delay),
                    retry_count: event.retry_count + 1,
                    error: message.clone(),
                }
            }
        }
    }

    /// Throttled: push `run_at` forward without spending a retry
    pub fn postpone(&self, event: &ScheduledEvent, now: DateTime<Utc>) -> Transition {
        let period = bounded_seconds(self.postpone_period_seconds.max(1));
        Transition::Postpone {
            next_run_at: shifted(now.max(event.run_at), period),
        }
    }
}
