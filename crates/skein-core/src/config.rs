//! Scheduler configuration.
//!
//! JSON で読み込み、足りない項目は既定値で埋める（`#[serde(default)]`）。

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How tasks are executed. Every ordering guarantee holds under both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeFlavor {
    /// Tasks run in parallel on a pool of worker threads.
    #[default]
    MultiThread,
    /// Tasks interleave cooperatively on one thread.
    CurrentThread,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub flavor: RuntimeFlavor,
    pub worker_threads: usize,
    /// Abort the blocked tasks once a stall is reported.
    pub abort_on_stall: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            flavor: RuntimeFlavor::MultiThread,
            worker_threads: 4,
            abort_on_stall: true,
        }
    }
}

impl SchedulerConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flavor == RuntimeFlavor::MultiThread && self.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the tokio runtime this configuration describes.
    pub fn build_runtime(&self) -> Result<tokio::runtime::Runtime, ConfigError> {
        self.validate()?;
        let mut builder = match self.flavor {
            RuntimeFlavor::MultiThread => {
                let mut b = tokio::runtime::Builder::new_multi_thread();
                b.worker_threads(self.worker_threads);
                b
            }
            RuntimeFlavor::CurrentThread => tokio::runtime::Builder::new_current_thread(),
        };
        Ok(builder.enable_time().build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = SchedulerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn partial_config_overrides_fields() {
        let config =
            SchedulerConfig::from_json_str(r#"{"flavor": "current_thread", "abort_on_stall": false}"#)
                .unwrap();
        assert_eq!(config.flavor, RuntimeFlavor::CurrentThread);
        assert!(!config.abort_on_stall);
        assert_eq!(config.worker_threads, 4);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = SchedulerConfig::from_json_str(r#"{"worker_threads": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_flavor_is_a_parse_error() {
        let err = SchedulerConfig::from_json_str(r#"{"flavor": "green"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builds_a_current_thread_runtime() {
        let config = SchedulerConfig {
            flavor: RuntimeFlavor::CurrentThread,
            ..SchedulerConfig::default()
        };
        let rt = config.build_runtime().unwrap();
        assert_eq!(rt.block_on(async { 1 + 1 }), 2);
    }
}
