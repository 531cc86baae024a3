//! Local directory backend for development and tests.

use async_trait::async_trait;
use glob::glob;
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::warn;

use super::storage::{BulkStorage, StorageEntry};
use crate::errors::StorageError;

pub struct LocalStorage {
    root: String,
}

impl LocalStorage {
    pub fn new(root: &str) -> Self {
        Self {
            root: root.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BulkStorage for LocalStorage {
    fn root(&self) -> &str {
        &self.root
    }

    async fn list(&self, path: &str) -> Result<Vec<StorageEntry>, StorageError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(StorageError::Unreachable {
                location: path.to_string(),
                reason: "directory does not exist".to_string(),
            });
        }

        let pattern = format!("{}/*", path.trim_end_matches('/'));
        let paths = glob(&pattern).map_err(|e| StorageError::ReadFailed {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let mut entries = Vec::new();
        for entry in paths {
            let entry_path = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!("Error reading storage entry: {}", e);
                    continue;
                }
            };
            let metadata = tokio::fs::metadata(&entry_path)
                .await
                .map_err(|e| StorageError::ReadFailed {
                    path: entry_path.display().to_string(),
                    reason: e.to_string(),
                })?;
            let name = entry_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            entries.push(StorageEntry {
                name,
                path: entry_path.display().to_string(),
                is_dir: metadata.is_dir(),
                size: if metadata.is_dir() { 0 } else { metadata.len() },
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_to_string(&self, path: &str) -> Result<String, StorageError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StorageError::ReadFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn read_range(
        &self,
        path: &str,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, StorageError> {
        let read_failed = |e: std::io::Error| StorageError::ReadFailed {
            path: path.to_string(),
            reason: e.to_string(),
        };
        let length = usize::try_from(length).map_err(|_| StorageError::ReadFailed {
            path: path.to_string(),
            reason: format!("range of {} bytes too large", length),
        })?;

        let mut file = tokio::fs::File::open(path).await.map_err(read_failed)?;
        file.seek(SeekFrom::Start(offset)).await.map_err(read_failed)?;
        let mut buffer = vec![0u8; length];
        file.read_exact(&mut buffer).await.map_err(read_failed)?;
        Ok(buffer)
    }
}
