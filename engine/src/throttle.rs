//! Concurrency ceiling for executor-bound work.
//!
//! In-flight work is whatever the executor is running right now: training
//! requests in RUNNING status whose job belongs to the throttle class.

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::config::RunTrainingConfig;
use crate::constants::jobs::{MODEL_TASK_JOBS, TRAINING_JOBS};
use crate::database::Database;
use crate::events::ThrottleClass;

pub struct ConcurrencyThrottle {
    database: Arc<Database>,
    training_limit: u32,
    model_task_limit: u32,
}

impl ConcurrencyThrottle {
    pub fn new(database: Arc<Database>, config: &RunTrainingConfig) -> Self {
        Self {
            database,
            training_limit: config.parallel_trainings_threshold,
            model_task_limit: config.parallel_tasks_threshold,
        }
    }

    pub fn limit(&self, class: ThrottleClass) -> u32 {
        match class {
            ThrottleClass::Training => self.training_limit,
            ThrottleClass::ModelTask => self.model_task_limit,
        }
    }

    fn job_names(class: ThrottleClass) -> &'static [&'static str] {
        match class {
            ThrottleClass::Training => TRAINING_JOBS,
            ThrottleClass::ModelTask => MODEL_TASK_JOBS,
        }
    }

    pub async fn in_flight(&self, class: ThrottleClass) -> Result<i64> {
        self.database
            .count_running_requests(Self::job_names(class))
            .await
    }

    /// True when another job of `class` may start now
    pub async fn admits(&self, class: ThrottleClass) -> Result<bool> {
        let in_flight = self.in_flight(class).await?;
        let limit = i64::from(self.limit(class));
        debug!("{:?} in flight: {}/{}", class, in_flight, limit);
        Ok(in_flight < limit)
    }
}
