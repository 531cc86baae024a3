//! Interval drivers for the engine
//!
//! Two repeated jobs run on a `tokio-cron-scheduler` `JobScheduler`:
//! - the dispatch tick (`[event_scheduler] interval_seconds`)
//! - the independent import scan (`[events.check_for_imports] check_interval_in_seconds`)
//!
//! Either job is skipped when disabled in configuration. Overlapping dispatch
//! ticks are prevented by the dispatcher itself.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::dispatcher::EventDispatcher;
use crate::imports::ImportScanner;

pub struct EngineScheduler {
    dispatcher: Arc<EventDispatcher>,
    scanner: Option<Arc<ImportScanner>>,
    config: Arc<Config>,
    scheduler: JobScheduler,
}

impl EngineScheduler {
    pub async fn new(
        dispatcher: Arc<EventDispatcher>,
        scanner: Option<Arc<ImportScanner>>,
        config: Arc<Config>,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create JobScheduler: {}", e))?;

        Ok(Self {
            dispatcher,
            scanner,
            config,
            scheduler,
        })
    }

    /// Register the enabled jobs and start the scheduler. Returns the number of jobs.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<usize> {
        let mut scheduled_count = 0;

        let dispatch = &self.config.event_scheduler;
        if dispatch.enabled {
            self.schedule_dispatch_job(dispatch.interval_seconds).await?;
            scheduled_count += 1;
            info!("Scheduled dispatch tick every {}s", dispatch.interval_seconds);
        } else {
            warn!("Event scheduler disabled, events will only run via the admin API");
        }

        match &self.scanner {
            Some(scanner) => {
                let interval = scanner.config().check_interval_in_seconds;
                self.schedule_import_scan_job(scanner.clone(), interval).await?;
                scheduled_count += 1;
                info!("Scheduled import scan every {}s", interval);
            }
            None => info!("Import scanning not configured, skipping schedule"),
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start scheduler: {}", e))?;
        info!("Engine scheduler started with {} jobs", scheduled_count);
        Ok(scheduled_count)
    }

    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to shut down scheduler: {}", e))
    }

    async fn schedule_dispatch_job(&self, interval_seconds: u64) -> Result<()> {
        let dispatcher = self.dispatcher.clone();

        let job = Job::new_repeated_async(
            Duration::from_secs(interval_seconds),
            move |_uuid, _scheduler| {
                let dispatcher = dispatcher.clone();
                Box::pin(async move {
                    match dispatcher.tick().await {
                        Ok(report) => debug!("Dispatch tick finished: {:?}", report),
                        Err(e) => error!("Dispatch tick failed: {}", e),
                    }
                })
            },
        )
        .map_err(|e| anyhow!("Failed to create dispatch job: {}", e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add dispatch job to scheduler: {}", e))?;
        Ok(())
    }

    async fn schedule_import_scan_job(
        &self,
        scanner: Arc<ImportScanner>,
        interval_seconds: u64,
    ) -> Result<()> {
        let job = Job::new_repeated_async(
            Duration::from_secs(interval_seconds),
            move |_uuid, _scheduler| {
                let scanner = scanner.clone();
                Box::pin(async move {
                    match scanner.scan(None).await {
                        Ok(report) if !report.published.is_empty() => {
                            info!("Import scan published {} folder(s)", report.published.len())
                        }
                        Ok(_) => debug!("Import scan found nothing new"),
                        Err(e) => error!("Import scan failed: {}", e),
                    }
                })
            },
        )
        .map_err(|e| anyhow!("Failed to create import scan job: {}", e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add import scan job to scheduler: {}", e))?;
        Ok(())
    }
}
