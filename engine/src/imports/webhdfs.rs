//! WebHDFS REST backend (`LISTSTATUS` and `OPEN`).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::storage::{join_path, BulkStorage, StorageEntry};
use crate::constants::http::{CONNECT_TIMEOUT, STORAGE_TIMEOUT};
use crate::errors::StorageError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListStatusResponse {
    file_statuses: FileStatuses,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FileStatuses {
    #[serde(default)]
    file_status: Vec<FileStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileStatus {
    path_suffix: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    length: u64,
}

pub struct WebHdfsStorage {
    client: Client,
    endpoint: String,
    root: String,
}

impl WebHdfsStorage {
    /// `service_url` may omit the scheme (`namenode:9870`)
    pub fn new(service_url: &str, root: &str) -> Result<Self, StorageError> {
        let base = service_url.trim_end_matches('/');
        let base = if base.starts_with("http://") || base.starts_with("https://") {
            base.to_string()
        } else {
            format!("http://{}", base)
        };

        let client = Client::builder()
            .timeout(STORAGE_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Unreachable {
                location: base.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/webhdfs/v1", base),
            root: root.to_string(),
        })
    }

    fn url(&self, path: &str, op: &str) -> String {
        format!("{}/{}?op={}", self.endpoint, path.trim_start_matches('/'), op)
    }

    async fn get(
        &self,
        path: &str,
        op: &str,
        params: &[(&str, u64)],
    ) -> Result<reqwest::Response, StorageError> {
        let url = self.url(path, op);
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| StorageError::Unreachable {
                location: url.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(StorageError::ReadFailed {
                path: path.to_string(),
                reason: format!("{} returned {}", op, response.status()),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl BulkStorage for WebHdfsStorage {
    fn root(&self) -> &str {
        &self.root
    }

    async fn list(&self, path: &str) -> Result<Vec<StorageEntry>, StorageError> {
        let response = self.get(path, "LISTSTATUS", &[]).await?;
        let body: ListStatusResponse =
            response
                .json()
                .await
                .map_err(|e| StorageError::InvalidResponse {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?;

        debug!(
            "WebHDFS listed {} entries under {}",
            body.file_statuses.file_status.len(),
            path
        );

        Ok(body
            .file_statuses
            .file_status
            .into_iter()
            .map(|status| StorageEntry {
                path: join_path(path, &status.path_suffix),
                is_dir: status.kind == "DIRECTORY",
                size: status.length,
                name: status.path_suffix,
            })
            .collect())
    }

    async fn read_to_string(&self, path: &str) -> Result<String, StorageError> {
        // OPEN redirects to a datanode; reqwest follows it
        let response = self.get(path, "OPEN", &[]).await?;
        response.text().await.map_err(|e| StorageError::ReadFailed {
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
        let response = self
            .get(path, "OPEN", &[("offset", offset), ("length", length)])
            .await?;
        let body = response.bytes().await.map_err(|e| StorageError::ReadFailed {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        if u64::try_from(body.len()).ok() != Some(length) {
            return Err(StorageError::InvalidResponse {
                path: path.to_string(),
                reason: format!("asked for {} bytes, got {}", length, body.len()),
            });
        }
        Ok(body.to_vec())
    }
}
