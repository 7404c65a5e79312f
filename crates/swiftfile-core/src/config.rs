//! Engine configuration types.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::DEFAULT_WORKERS;

/// Configuration shared by the lister and the transfer engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Number of blocking workers in the shared pool.
    #[builder(default = "DEFAULT_WORKERS")]
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Include hidden entries (starting with .) in listings.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Only report sub-directories in listings.
    #[builder(default = "false")]
    #[serde(default)]
    pub directories_only: bool,

    /// Minimum delay between two progress updates of a running job.
    #[builder(default = "default_progress_interval()")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: Duration,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_true() -> bool {
    true
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(100)
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(0) = self.workers {
            return Err("Worker count must be at least 1".to_string());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new engine config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Check if an entry name should be left out of a listing.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            include_hidden: true,
            directories_only: false,
            progress_interval: default_progress_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::builder()
            .workers(4usize)
            .directories_only(true)
            .build()
            .unwrap();

        assert_eq!(config.workers, 4);
        assert!(config.directories_only);
        assert!(config.include_hidden);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = EngineConfig::builder().workers(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_should_skip_hidden() {
        let mut config = EngineConfig::default();
        assert!(!config.should_skip_hidden(".git"));

        config.include_hidden = false;
        assert!(config.should_skip_hidden(".git"));
        assert!(!config.should_skip_hidden("src"));
    }
}
