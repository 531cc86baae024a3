// File: engine/src/config/manager.rs
use super::{Config, StorageKind};
use crate::constants::{defaults, limits};
use crate::errors::ConfigError;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

pub const CONFIG_PATH_ENV: &str = "ENGINE_CONFIG";

pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_path: String) -> Result<Self> {
        let config = Self::load_configuration(&config_path).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    /// `ENGINE_CONFIG` when set and non-empty, the default location otherwise
    pub fn config_path_from_env() -> String {
        std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| defaults::CONFIG_PATH.to_string())
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    async fn load_configuration(config_path: &str) -> Result<Config> {
        debug!("Loading engine config: {}", config_path);

        let content = fs::read_to_string(config_path).await.map_err(|e| {
            anyhow!(ConfigError::LoadFailed {
                path: config_path.to_string(),
                reason: e.to_string(),
            })
        })?;

        let config = Self::parse(&content)?;

        info!(
            "Loaded config: dispatch every {}s (retry threshold {}), {} parallel trainings, imports {}",
            config.event_scheduler.interval_seconds,
            config.event_scheduler.retry_threshold,
            config.events.run_training.parallel_trainings_threshold,
            if config.events.check_for_imports.enabled {
                "enabled"
            } else {
                "disabled"
            }
        );

        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn parse(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content).map_err(|e| {
            anyhow!(ConfigError::ParseError {
                reason: e.to_string()
            })
        })?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let scheduler = &config.event_scheduler;
        if scheduler.interval_seconds == 0 {
            return Err(invalid("event_scheduler.interval_seconds", "must be greater than 0"));
        }
        if scheduler.max_retry_delay_seconds == 0 {
            return Err(invalid(
                "event_scheduler.max_retry_delay_seconds",
                "must be greater than 0",
            ));
        }
        if scheduler.too_old_to_handle_seconds == 0 {
            return Err(invalid(
                "event_scheduler.too_old_to_handle_seconds",
                "must be greater than 0",
            ));
        }

        let run_training = &config.events.run_training;
        if run_training.parallel_trainings_threshold == 0 {
            return Err(invalid(
                "events.run_training.parallel_trainings_threshold",
                "must be at least 1",
            ));
        }
        if run_training.parallel_tasks_threshold == 0 {
            return Err(invalid(
                "events.run_training.parallel_tasks_threshold",
                "must be at least 1",
            ));
        }
        if run_training.postpone_period_in_seconds == 0 {
            return Err(invalid(
                "events.run_training.postpone_period_in_seconds",
                "must be greater than 0",
            ));
        }

        if config.events.check_tasks.check_interval_in_seconds == 0 {
            return Err(invalid(
                "events.check_tasks.check_interval_in_seconds",
                "must be greater than 0",
            ));
        }

        let delays = [
            ("event_scheduler.base_retry_delay_seconds", scheduler.base_retry_delay_seconds),
            ("event_scheduler.max_retry_delay_seconds", scheduler.max_retry_delay_seconds),
            ("event_scheduler.too_old_to_handle_seconds", scheduler.too_old_to_handle_seconds),
            (
                "events.run_training.postpone_period_in_seconds",
                run_training.postpone_period_in_seconds,
            ),
            (
                "events.check_tasks.check_interval_in_seconds",
                config.events.check_tasks.check_interval_in_seconds,
            ),
            (
                "events.check_for_imports.check_interval_in_seconds",
                config.events.check_for_imports.check_interval_in_seconds,
            ),
        ];
        for (field, seconds) in delays {
            if seconds > limits::MAX_DELAY_SECONDS {
                return Err(invalid(
                    field,
                    &format!("must be at most {} seconds", limits::MAX_DELAY_SECONDS),
                ));
            }
        }

        if config.executor.base_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "executor.base_url".to_string(),
            });
        }

        let imports = &config.events.check_for_imports;
        if imports.enabled {
            if imports.check_interval_in_seconds == 0 {
                return Err(invalid(
                    "events.check_for_imports.check_interval_in_seconds",
                    "must be greater than 0",
                ));
            }
            if imports.data_path.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: "events.check_for_imports.data_path".to_string(),
                });
            }
            if imports.storage == StorageKind::Webhdfs && imports.service_url.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: "events.check_for_imports.service_url".to_string(),
                });
            }
        } else {
            warn!("Import scanning disabled in configuration");
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
