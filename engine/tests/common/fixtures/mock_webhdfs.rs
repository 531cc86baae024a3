//! Mock WebHDFS namenode for import scanner tests

use serde_json::json;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

pub struct MockWebHdfsServer {
    pub server: MockServer,
    pub service_url: String,
}

/// One `FileStatus` entry of a `LISTSTATUS` answer
pub fn file_status(name: &str, length: u64) -> serde_json::Value {
    json!({ "pathSuffix": name, "type": "FILE", "length": length })
}

pub fn dir_status(name: &str) -> serde_json::Value {
    json!({ "pathSuffix": name, "type": "DIRECTORY", "length": 0 })
}

impl MockWebHdfsServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let service_url = server.uri();
        Self {
            server,
            service_url,
        }
    }

    /// `LISTSTATUS` on `hdfs_path` answers with `entries`
    pub async fn mock_list(&self, hdfs_path: &str, entries: Vec<serde_json::Value>) {
        Mock::given(method("GET"))
            .and(path(format!("/webhdfs/v1{}", hdfs_path)))
            .and(query_param("op", "LISTSTATUS"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "FileStatuses": { "FileStatus": entries }
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_list_unavailable(&self, hdfs_path: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/webhdfs/v1{}", hdfs_path)))
            .and(query_param("op", "LISTSTATUS"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&self.server)
            .await;
    }

    /// `OPEN` on `hdfs_path` returns `body`
    pub async fn mock_open(&self, hdfs_path: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/webhdfs/v1{}", hdfs_path)))
            .and(query_param("op", "OPEN"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Ranged `OPEN` on `hdfs_path` returns `body`
    pub async fn mock_open_range(&self, hdfs_path: &str, offset: u64, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(format!("/webhdfs/v1{}", hdfs_path)))
            .and(query_param("op", "OPEN"))
            .and(query_param("offset", offset.to_string()))
            .and(query_param("length", body.len().to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(&self.server)
            .await;
    }
}
