//! Test configuration builder for creating test configs programmatically

use std::fs;
use std::path::{Path, PathBuf};

use engine::config::{Config, ConfigManager};

/// Builder producing a `main.toml` document
pub struct TestConfigBuilder {
    executor_url: String,
    retry_threshold: u32,
    base_retry_delay_seconds: u64,
    max_retry_delay_seconds: u64,
    too_old_to_handle_seconds: u64,
    parallel_trainings_threshold: u32,
    parallel_tasks_threshold: u32,
    postpone_period_in_seconds: u64,
    check_interval_in_seconds: u64,
    imports: Option<ImportsSection>,
    topic_models_path: String,
}

struct ImportsSection {
    storage: String,
    service_url: String,
    data_path: String,
    threshold_mb: u64,
    require_success_marker: bool,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            executor_url: "http://127.0.0.1:9".to_string(),
            retry_threshold: 3,
            base_retry_delay_seconds: 15,
            max_retry_delay_seconds: 600,
            too_old_to_handle_seconds: 86400,
            parallel_trainings_threshold: 2,
            parallel_tasks_threshold: 4,
            postpone_period_in_seconds: 60,
            check_interval_in_seconds: 30,
            imports: None,
            topic_models_path: "/tmp/models".to_string(),
        }
    }

    pub fn with_executor_url(mut self, url: &str) -> Self {
        self.executor_url = url.to_string();
        self
    }

    pub fn with_retry_threshold(mut self, threshold: u32) -> Self {
        self.retry_threshold = threshold;
        self
    }

    pub fn with_too_old_to_handle(mut self, seconds: u64) -> Self {
        self.too_old_to_handle_seconds = seconds;
        self
    }

    pub fn with_parallel_trainings(mut self, threshold: u32) -> Self {
        self.parallel_trainings_threshold = threshold;
        self
    }

    pub fn with_parallel_tasks(mut self, threshold: u32) -> Self {
        self.parallel_tasks_threshold = threshold;
        self
    }

    pub fn with_postpone_period(mut self, seconds: u64) -> Self {
        self.postpone_period_in_seconds = seconds;
        self
    }

    pub fn with_check_interval(mut self, seconds: u64) -> Self {
        self.check_interval_in_seconds = seconds;
        self
    }

    pub fn with_models_path(mut self, path: &Path) -> Self {
        self.topic_models_path = path.display().to_string();
        self
    }

    /// Enable the scanner on a local directory
    pub fn with_local_imports(mut self, data_path: &Path, threshold_mb: u64) -> Self {
        self.imports = Some(ImportsSection {
            storage: "local".to_string(),
            service_url: String::new(),
            data_path: data_path.display().to_string(),
            threshold_mb,
            require_success_marker: true,
        });
        self
    }

    /// Enable the scanner on a WebHDFS namenode
    pub fn with_webhdfs_imports(mut self, service_url: &str, data_path: &str, threshold_mb: u64) -> Self {
        self.imports = Some(ImportsSection {
            storage: "webhdfs".to_string(),
            service_url: service_url.to_string(),
            data_path: data_path.to_string(),
            threshold_mb,
            require_success_marker: true,
        });
        self
    }

    pub fn without_success_marker(mut self) -> Self {
        if let Some(imports) = self.imports.as_mut() {
            imports.require_success_marker = false;
        }
        self
    }

    pub fn to_toml(&self) -> String {
        let mut toml = format!(
            r#"
host = "127.0.0.1"
port = 8095
database_path = "data/test.db"

[event_scheduler]
enabled = true
interval_seconds = 10
retry_threshold = {}
base_retry_delay_seconds = {}
max_retry_delay_seconds = {}
too_old_to_handle_seconds = {}

[events.run_training]
parallel_trainings_threshold = {}
parallel_tasks_threshold = {}
postpone_period_in_seconds = {}

[events.check_tasks]
check_interval_in_seconds = {}

[executor]
base_url = "{}"
request_timeout_seconds = 5

[models]
topic_models_path = "{}"
domain_models_path = "/data/DCmodels"
datasets_path = "/data/datasets"
zero_shot_model_path = "/data/zeroshot"
"#,
            self.retry_threshold,
            self.base_retry_delay_seconds,
            self.max_retry_delay_seconds,
            self.too_old_to_handle_seconds,
            self.parallel_trainings_threshold,
            self.parallel_tasks_threshold,
            self.postpone_period_in_seconds,
            self.check_interval_in_seconds,
            self.executor_url,
            self.topic_models_path,
        );

        if let Some(imports) = &self.imports {
            toml.push_str(&format!(
                r#"
[events.check_for_imports]
enabled = true
check_interval_in_seconds = 300
file_size_threshold_in_mb = {}
storage = "{}"
service_url = "{}"
data_path = "{}"
require_success_marker = {}
"#,
                imports.threshold_mb,
                imports.storage,
                imports.service_url,
                imports.data_path,
                imports.require_success_marker,
            ));
        }
        toml
    }

    pub fn build(&self) -> Config {
        ConfigManager::parse(&self.to_toml()).expect("test config must be valid")
    }

    /// Write `main.toml` into `dir`, returns its path
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join("main.toml");
        fs::write(&path, self.to_toml()).expect("Failed to write test config");
        path
    }
}
