//! Central repository for configuration defaults, reserved identities and limits
//!
//! This module organizes constants by category to improve maintainability
//! and provide a single source of truth for intervals, thresholds and names.

use std::time::Duration;

/// HTTP client timeout constants
pub mod http {
    use super::Duration;

    /// Default timeout for requests to the training executor
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Timeout for establishing HTTP connections
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Timeout for WebHDFS listing and metadata reads
    pub const STORAGE_TIMEOUT: Duration = Duration::from_secs(20);
}

/// Default configuration values
pub mod defaults {
    /// Dispatch tick interval
    pub const DISPATCH_INTERVAL_SECONDS: u64 = 10;

    /// Attempts allowed before an event is failed
    pub const RETRY_THRESHOLD: u32 = 3;

    /// Delay of the first retry; doubled for every further attempt
    pub const BASE_RETRY_DELAY_SECONDS: u64 = 15;

    /// Upper bound for a single retry delay
    pub const MAX_RETRY_DELAY_SECONDS: u64 = 600;

    /// Events older than this are failed instead of dispatched
    pub const TOO_OLD_TO_HANDLE_SECONDS: u64 = 86400; // 24 hours

    /// Concurrent training jobs allowed on the executor
    pub const PARALLEL_TRAININGS_THRESHOLD: u32 = 2;

    /// Concurrent model management jobs (reset/fuse) allowed on the executor
    pub const PARALLEL_TASKS_THRESHOLD: u32 = 4;

    /// Delay applied to a throttled event
    pub const POSTPONE_PERIOD_SECONDS: u64 = 60;

    /// Interval of the running-tasks housekeeping event
    pub const CHECK_TASKS_INTERVAL_SECONDS: u64 = 30;

    /// Interval of the independent import scan
    pub const CHECK_IMPORTS_INTERVAL_SECONDS: u64 = 300;

    /// Minimum aggregate folder size for an import, in megabytes
    pub const FILE_SIZE_THRESHOLD_MB: u64 = 100;

    /// Admin API bind host
    pub const HOST: &str = "0.0.0.0";

    /// Admin API port
    pub const PORT: u16 = 8095;

    /// SQLite database file
    pub const DATABASE_PATH: &str = "data/events.db";

    /// Default config file location
    pub const CONFIG_PATH: &str = "config/main.toml";
}

/// Reserved identities used by system-initiated events
pub mod identity {
    use uuid::Uuid;

    /// Creator of every system-published event
    pub const SYSTEM_CREATOR: Uuid = Uuid::nil();

    /// Key of the running-tasks housekeeping singleton
    pub const CHECK_TASKS_KEY: &str = "running-tasks";

    /// Key type of housekeeping singletons
    pub const HOUSEKEEPING_KEY_TYPE: &str = "housekeeping";

    /// Key type of import-detected events (key is the folder name)
    pub const CORPUS_IMPORT_KEY_TYPE: &str = "corpus-import";

    /// Key type of events scoped to a training task request (key is the request id)
    pub const TRAINING_REQUEST_KEY_TYPE: &str = "training-request";
}

/// Executor job names, used to classify in-flight requests
pub mod jobs {
    /// Topic model training service
    pub const TRAIN_TOPIC_MODELS: &str = "train-topic-models";

    /// Domain model training service
    pub const TRAIN_DOMAIN_MODELS: &str = "train-domain-models";

    /// Model management service (reset, fuse)
    pub const MANAGE_MODELS: &str = "manage-models";

    /// Job names counted against the training threshold
    pub const TRAINING_JOBS: &[&str] = &[TRAIN_TOPIC_MODELS, TRAIN_DOMAIN_MODELS];

    /// Job names counted against the model task threshold
    pub const MODEL_TASK_JOBS: &[&str] = &[MANAGE_MODELS];

    /// Model config file inside a model directory
    pub const MODEL_CONFIG_FILE_NAME: &str = "trainconfig.json";

    /// Log file written next to the model config
    pub const EXECUTION_LOG_FILE_NAME: &str = "execution.log";

    /// Domain classifier config inside a domain model directory
    pub const DOMAIN_MODEL_CONFIG_FILE_NAME: &str = "dc_config.json";

    /// Per-task logs of the domain model curation jobs
    pub const DOMAIN_RETRAIN_LOG_FILE_NAME: &str = "retrain.log";
    pub const DOMAIN_CLASSIFY_LOG_FILE_NAME: &str = "classify.log";
    pub const DOMAIN_EVALUATE_LOG_FILE_NAME: &str = "evaluate.log";
    pub const DOMAIN_SAMPLE_LOG_FILE_NAME: &str = "sample.log";
    pub const DOMAIN_FEEDBACK_LOG_FILE_NAME: &str = "feedback.log";

    /// Domain training task that needs the zero-shot model
    pub const ZERO_SHOT_TASK: &str = "on_create_category_name";
}

/// Import scan file names
pub mod imports {
    /// Marker written by the producer when a folder is complete
    pub const SUCCESS_MARKER: &str = "_SUCCESS";

    /// Optional sidecar describing the dataset
    pub const METADATA_FILE: &str = "metadata.json";

    /// Bytes per configured megabyte
    pub const BYTES_PER_MB: u64 = 1_000_000;

    /// Only these files hold records and count towards the folder size
    pub const PARQUET_EXTENSION: &str = ".parquet";

    /// Trailing magic of every parquet file
    pub const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

    /// Footers larger than this are not fetched
    pub const MAX_FOOTER_BYTES: u64 = 16 * 1024 * 1024;
}

/// Limits and constraints
pub mod limits {
    /// Maximum events returned by a list query without explicit limit
    pub const MAX_LISTED_EVENTS: i64 = 500;

    /// Concurrent executor status queries during reconciliation
    pub const MAX_CONCURRENT_STATUS_QUERIES: usize = 4;

    /// Upper bound for any configured delay or age, ten years
    pub const MAX_DELAY_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;
}
