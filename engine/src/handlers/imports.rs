use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

use super::{EventHandler, HandlerReport};
use crate::database::{CorpusImportStatus, Database};
use crate::events::{EventPayload, ScheduledEvent};
use crate::imports::ImportScanner;

/// Runs the import scanner on demand
pub struct CheckForImportsHandler {
    scanner: Arc<ImportScanner>,
}

impl CheckForImportsHandler {
    pub fn new(scanner: Arc<ImportScanner>) -> Self {
        Self { scanner }
    }
}

#[async_trait]
impl EventHandler for CheckForImportsHandler {
    #[instrument(skip_all, fields(event_id = %event.id))]
    async fn handle(&self, event: &ScheduledEvent) -> HandlerReport {
        let threshold = match event.payload() {
            Ok(EventPayload::CheckForImports(data)) => data.file_size_threshold_in_mb,
            Ok(_) => None,
            Err(e) => return e.into(),
        };

        match self.scanner.scan(threshold).await {
            Ok(report) => {
                info!(
                    "On-demand import scan published {} folder(s)",
                    report.published.len()
                );
                HandlerReport::success()
            }
            Err(e) => HandlerReport::retryable(format!("import scan failed: {}", e)),
        }
    }
}

/// Hands a detected import over to downstream consumers
pub struct ImportDetectedHandler {
    database: Arc<Database>,
}

impl ImportDetectedHandler {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl EventHandler for ImportDetectedHandler {
    #[instrument(skip_all, fields(event_id = %event.id))]
    async fn handle(&self, event: &ScheduledEvent) -> HandlerReport {
        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(e) => return e.into(),
        };
        if let Err(e) = payload.validate() {
            return e.into();
        }
        let EventPayload::ImportDetected(data) = payload else {
            return HandlerReport::non_retryable("unexpected payload for import registration");
        };

        match self
            .database
            .set_corpus_import_status(
                data.import_id,
                CorpusImportStatus::Detected,
                CorpusImportStatus::Registered,
            )
            .await
        {
            Ok(true) => {
                info!("Corpus import '{}' registered as '{}'", data.folder, data.name);
                HandlerReport::success()
            }
            Ok(false) => HandlerReport::non_retryable(format!(
                "corpus import {} is no longer DETECTED",
                data.import_id
            )),
            Err(e) => HandlerReport::retryable(format!(
                "failed to register corpus import {}: {}",
                data.import_id, e
            )),
        }
    }
}
