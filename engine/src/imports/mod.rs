//! Import scanner
//!
//! Discovers dataset folders that arrived on bulk storage and announces each
//! one exactly once with an `import-detected` event.
//!
//! A folder qualifies when:
//! - it was not reported before (a FAILED import is tried again)
//! - it carries the `_SUCCESS` marker, when required
//! - it holds at least one `.parquet` data file
//! - the data files together are larger than the size threshold
//!
//! Records and columns come from `metadata.json` when the folder has one,
//! from the footer of its first non-empty parquet file otherwise.
//!
//! Storage being unreachable is not an error: the scan reports nothing.

pub mod footer;
pub mod local;
pub mod metadata;
pub mod storage;
pub mod webhdfs;

pub use footer::{read_footer, ParquetSummary};
pub use local::LocalStorage;
pub use metadata::CorpusMetadata;
pub use storage::{BulkStorage, StorageEntry};
pub use webhdfs::WebHdfsStorage;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::{CheckImportsConfig, StorageKind};
use crate::constants::identity::{CORPUS_IMPORT_KEY_TYPE, SYSTEM_CREATOR};
use crate::constants::imports::{BYTES_PER_MB, METADATA_FILE, PARQUET_EXTENSION, SUCCESS_MARKER};
use crate::database::Database;
use crate::errors::StorageError;
use crate::events::{EventPayload, ImportDetectedData, PublishData};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub folders_seen: usize,
    pub already_reported: usize,
    pub skipped: usize,
    pub published: Vec<String>,
}

/// Folder that passed every check, ready to be announced
#[derive(Debug, Clone)]
struct DetectedFolder {
    folder: String,
    path: String,
    total_size_bytes: u64,
    files: u32,
    metadata: CorpusMetadata,
}

pub struct ImportScanner {
    database: Arc<Database>,
    storage: Arc<dyn BulkStorage>,
    config: CheckImportsConfig,
}

impl ImportScanner {
    pub fn new(
        database: Arc<Database>,
        storage: Arc<dyn BulkStorage>,
        config: CheckImportsConfig,
    ) -> Self {
        Self {
            database,
            storage,
            config,
        }
    }

    /// Scanner over the configured storage backend
    pub fn from_config(
        database: Arc<Database>,
        config: &CheckImportsConfig,
    ) -> Result<Self, StorageError> {
        let storage: Arc<dyn BulkStorage> = match config.storage {
            StorageKind::Webhdfs => Arc::new(WebHdfsStorage::new(
                &config.service_url,
                &config.data_path,
            )?),
            StorageKind::Local => Arc::new(LocalStorage::new(&config.data_path)),
        };
        Ok(Self::new(database, storage, config.clone()))
    }

    pub fn config(&self) -> &CheckImportsConfig {
        &self.config
    }

    /// Scan once; `threshold_override_mb` replaces the configured threshold
    #[instrument(skip(self), fields(root = %self.storage.root()))]
    pub async fn scan(&self, threshold_override_mb: Option<u64>) -> Result<ScanReport> {
        let threshold_bytes = match threshold_override_mb {
            Some(mb) => mb.saturating_mul(BYTES_PER_MB),
            None => self.config.file_size_threshold_in_bytes(),
        };

        let reported = self.database.get_reported_import_folders().await?;
        let mut report = ScanReport::default();

        let entries = match self.storage.list(self.storage.root()).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Import storage not available, nothing to scan: {}", e);
                return Ok(report);
            }
        };

        for entry in entries.into_iter().filter(|e| e.is_dir) {
            report.folders_seen += 1;

            if reported.contains(&entry.name) {
                debug!("Folder '{}' already reported, skipping", entry.name);
                report.already_reported += 1;
                continue;
            }

            match self.inspect_folder(&entry, threshold_bytes).await {
                Some(detected) => {
                    self.publish(&detected).await?;
                    report.published.push(detected.folder);
                }
                None => report.skipped += 1,
            }
        }

        if report.published.is_empty() {
            debug!(
                "Import scan done: {} folders, nothing new",
                report.folders_seen
            );
        } else {
            info!(
                "Import scan published {} new folder(s): {:?}",
                report.published.len(),
                report.published
            );
        }
        Ok(report)
    }

    async fn inspect_folder(
        &self,
        folder: &StorageEntry,
        threshold_bytes: u64,
    ) -> Option<DetectedFolder> {
        let files = match self.storage.list(&folder.path).await {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list folder '{}': {}", folder.name, e);
                return None;
            }
        };

        if self.config.require_success_marker && !files.iter().any(|f| f.name == SUCCESS_MARKER) {
            debug!("Folder '{}' not complete yet (no {})", folder.name, SUCCESS_MARKER);
            return None;
        }

        let data_files: Vec<&StorageEntry> = files.iter().filter(|f| is_data_file(f)).collect();
        if data_files.is_empty() {
            debug!("No data files in folder '{}'", folder.name);
            return None;
        }

        let total_size_bytes: u64 = data_files.iter().map(|f| f.size).sum();
        if total_size_bytes <= threshold_bytes {
            debug!(
                "Folder '{}' holds {} bytes, threshold is {}",
                folder.name, total_size_bytes, threshold_bytes
            );
            return None;
        }

        let metadata = match files.iter().find(|f| f.name == METADATA_FILE) {
            Some(file) => self.read_metadata(file).await,
            None => self.summarize(&data_files).await,
        };

        Some(DetectedFolder {
            folder: folder.name.clone(),
            path: folder.path.clone(),
            total_size_bytes,
            files: u32::try_from(data_files.len()).unwrap_or(u32::MAX),
            metadata,
        })
    }

    async fn read_metadata(&self, file: &StorageEntry) -> CorpusMetadata {
        let content = match self.storage.read_to_string(&file.path).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to fetch metadata file {}: {}", file.path, e);
                return CorpusMetadata::default();
            }
        };
        CorpusMetadata::parse(&content).unwrap_or_else(|e| {
            warn!("Ignoring unreadable metadata file {}: {}", file.path, e);
            CorpusMetadata::default()
        })
    }

    async fn summarize(&self, data_files: &[&StorageEntry]) -> CorpusMetadata {
        let Some(first) = data_files.iter().find(|f| f.size > 0) else {
            return CorpusMetadata::default();
        };
        match read_footer(self.storage.as_ref(), first).await {
            Ok(summary) => CorpusMetadata {
                columns: summary.columns,
                count: Some(summary.records),
                ..CorpusMetadata::default()
            },
            Err(e) => {
                warn!("No parquet summary for {}: {}", first.path, e);
                CorpusMetadata::default()
            }
        }
    }

    /// Record the import and announce it in one transaction
    async fn publish(&self, detected: &DetectedFolder) -> Result<()> {
        let name = detected
            .metadata
            .declared_name()
            .unwrap_or_else(|| detected.folder.clone());

        let mut tx = self.database.begin().await?;
        let import = Database::upsert_detected_import_in(
            &mut tx,
            &detected.folder,
            &detected.path,
            &name,
            detected.total_size_bytes,
        )
        .await?;

        let payload = EventPayload::ImportDetected(ImportDetectedData {
            import_id: import.id,
            folder: detected.folder.clone(),
            path: detected.path.clone(),
            name,
            records: detected.metadata.count,
            columns: detected.metadata.columns.clone(),
            arguments: detected.metadata.arguments.clone(),
            total_size_bytes: detected.total_size_bytes,
            files: detected.files,
        });
        let data = PublishData::from_payload(
            &payload,
            &detected.folder,
            CORPUS_IMPORT_KEY_TYPE,
            Utc::now(),
            SYSTEM_CREATOR,
        )?;
        let event = Database::publish_event_in(&mut tx, &data).await?;
        tx.commit().await?;

        info!(
            "Folder '{}' detected ({} bytes in {} files), event {}",
            detected.folder, detected.total_size_bytes, detected.files, event.id
        );
        Ok(())
    }
}

fn is_data_file(entry: &StorageEntry) -> bool {
    !entry.is_dir && entry.name.ends_with(PARQUET_EXTENSION)
}
