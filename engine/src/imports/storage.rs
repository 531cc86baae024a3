use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

/// Read-only view of the bulk storage holding incoming datasets
#[async_trait]
pub trait BulkStorage: Send + Sync {
    /// Directory the scanner lists for dataset folders
    fn root(&self) -> &str;

    async fn list(&self, path: &str) -> Result<Vec<StorageEntry>, StorageError>;

    async fn read_to_string(&self, path: &str) -> Result<String, StorageError>;

    /// `length` bytes starting at `offset`
    async fn read_range(
        &self,
        path: &str,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, StorageError>;
}

pub(crate) fn join_path(parent: &str, child: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), child.trim_start_matches('/'))
}
