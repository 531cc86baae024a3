// File: engine/src/config/mod.rs
pub mod manager;
use serde::{Deserialize, Serialize};
pub use manager::ConfigManager;

use crate::constants::{defaults, http, imports::BYTES_PER_MB};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub event_scheduler: EventSchedulerConfig,
    #[serde(default)]
    pub events: EventsConfig,
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dispatch_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_retry_threshold")]
    pub retry_threshold: u32,
    #[serde(default = "default_base_retry_delay")]
    pub base_retry_delay_seconds: u64,
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_seconds: u64,
    #[serde(default = "default_too_old_to_handle")]
    pub too_old_to_handle_seconds: u64,
}

impl Default for EventSchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: defaults::DISPATCH_INTERVAL_SECONDS,
            retry_threshold: defaults::RETRY_THRESHOLD,
            base_retry_delay_seconds: defaults::BASE_RETRY_DELAY_SECONDS,
            max_retry_delay_seconds: defaults::MAX_RETRY_DELAY_SECONDS,
            too_old_to_handle_seconds: defaults::TOO_OLD_TO_HANDLE_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default)]
    pub run_training: RunTrainingConfig,
    #[serde(default)]
    pub check_tasks: CheckTasksConfig,
    #[serde(default)]
    pub check_for_imports: CheckImportsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTrainingConfig {
    #[serde(default = "default_parallel_trainings")]
    pub parallel_trainings_threshold: u32,
    #[serde(default = "default_parallel_tasks")]
    pub parallel_tasks_threshold: u32,
    #[serde(default = "default_postpone_period")]
    pub postpone_period_in_seconds: u64,
}

impl Default for RunTrainingConfig {
    fn default() -> Self {
        Self {
            parallel_trainings_threshold: defaults::PARALLEL_TRAININGS_THRESHOLD,
            parallel_tasks_threshold: defaults::PARALLEL_TASKS_THRESHOLD,
            postpone_period_in_seconds: defaults::POSTPONE_PERIOD_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckTasksConfig {
    #[serde(default = "default_check_tasks_interval")]
    pub check_interval_in_seconds: u64,
}

impl Default for CheckTasksConfig {
    fn default() -> Self {
        Self {
            check_interval_in_seconds: defaults::CHECK_TASKS_INTERVAL_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Webhdfs,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckImportsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_check_imports_interval")]
    pub check_interval_in_seconds: u64,
    #[serde(default = "default_file_size_threshold")]
    pub file_size_threshold_in_mb: u64,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default)]
    pub service_url: String,
    #[serde(default)]
    pub data_path: String,
    #[serde(default = "default_true")]
    pub require_success_marker: bool,
}

impl Default for CheckImportsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            check_interval_in_seconds: defaults::CHECK_IMPORTS_INTERVAL_SECONDS,
            file_size_threshold_in_mb: defaults::FILE_SIZE_THRESHOLD_MB,
            storage: StorageKind::Webhdfs,
            service_url: String::new(),
            data_path: String::new(),
            require_success_marker: true,
        }
    }
}

impl CheckImportsConfig {
    pub fn file_size_threshold_in_bytes(&self) -> u64 {
        self.file_size_threshold_in_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Enabled and pointing at a usable storage location
    pub fn is_usable(&self) -> bool {
        if !self.enabled || self.data_path.trim().is_empty() {
            return false;
        }
        match self.storage {
            StorageKind::Webhdfs => !self.service_url.trim().is_empty(),
            StorageKind::Local => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_topic_models_path")]
    pub topic_models_path: String,
    #[serde(default = "default_domain_models_path")]
    pub domain_models_path: String,
    /// Dataset root handed to domain classifier jobs
    #[serde(default = "default_datasets_path")]
    pub datasets_path: String,
    #[serde(default = "default_zero_shot_model_path")]
    pub zero_shot_model_path: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            topic_models_path: default_topic_models_path(),
            domain_models_path: default_domain_models_path(),
            datasets_path: default_datasets_path(),
            zero_shot_model_path: default_zero_shot_model_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    defaults::HOST.to_string()
}

fn default_port() -> u16 {
    defaults::PORT
}

fn default_database_path() -> String {
    defaults::DATABASE_PATH.to_string()
}

fn default_dispatch_interval() -> u64 {
    defaults::DISPATCH_INTERVAL_SECONDS
}

fn default_retry_threshold() -> u32 {
    defaults::RETRY_THRESHOLD
}

fn default_base_retry_delay() -> u64 {
    defaults::BASE_RETRY_DELAY_SECONDS
}

fn default_max_retry_delay() -> u64 {
    defaults::MAX_RETRY_DELAY_SECONDS
}

fn default_too_old_to_handle() -> u64 {
    defaults::TOO_OLD_TO_HANDLE_SECONDS
}

fn default_parallel_trainings() -> u32 {
    defaults::PARALLEL_TRAININGS_THRESHOLD
}

fn default_parallel_tasks() -> u32 {
    defaults::PARALLEL_TASKS_THRESHOLD
}

fn default_postpone_period() -> u64 {
    defaults::POSTPONE_PERIOD_SECONDS
}

fn default_check_tasks_interval() -> u64 {
    defaults::CHECK_TASKS_INTERVAL_SECONDS
}

fn default_check_imports_interval() -> u64 {
    defaults::CHECK_IMPORTS_INTERVAL_SECONDS
}

fn default_file_size_threshold() -> u64 {
    defaults::FILE_SIZE_THRESHOLD_MB
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Webhdfs
}

fn default_request_timeout() -> u64 {
    http::REQUEST_TIMEOUT.as_secs()
}

fn default_topic_models_path() -> String {
    "data/models/topic".to_string()
}

fn default_domain_models_path() -> String {
    "data/models/domain".to_string()
}

fn default_datasets_path() -> String {
    "data/datasets".to_string()
}

fn default_zero_shot_model_path() -> String {
    "data/models/zeroshot".to_string()
}
