//! Configuration structures for the freshness coordinator
//!
//! The coordinator receives the complete list of tracked sources at
//! construction; nothing about what is mirrored is hardcoded elsewhere.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::layout::is_plain_file_name;
use crate::app::models::DatasetSource;
use crate::constants::{files, freshness};
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for the freshness coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Minimum time between two remote checks of a dataset
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
    /// Datasets and the files mirrored from each
    pub sources: Vec<DatasetSource>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cooldown: freshness::DEFAULT_COOLDOWN,
            sources: DatasetSource::default_sources(),
        }
    }
}

impl CoordinatorConfig {
    /// Create a configuration tracking `sources` with the default cooldown
    pub fn new(sources: Vec<DatasetSource>) -> Self {
        Self {
            sources,
            ..Default::default()
        }
    }

    /// Set the cooldown between remote checks
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Validate the configuration
    ///
    /// Local paths are derived from the file name alone, so names must be
    /// plain and unique across every source.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cooldown.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "coordinator.cooldown".to_string(),
                value: "0s".to_string(),
                reason: "Cooldown must be greater than zero".to_string(),
            });
        }

        if self.sources.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "datasets".to_string(),
                value: "[]".to_string(),
                reason: "At least one dataset must be configured".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "datasets.id".to_string(),
                    value: source.id.clone(),
                    reason: "Dataset identifier cannot be empty".to_string(),
                });
            }

            for name in &source.files {
                if !is_plain_file_name(name) || name == files::TEMP_DIR_NAME {
                    return Err(ConfigError::InvalidFileName {
                        dataset: source.id.clone(),
                        name: name.clone(),
                    });
                }
                if !seen.insert(name.as_str()) {
                    return Err(ConfigError::DuplicateFile { name: name.clone() });
                }
            }
        }

        Ok(())
    }

    /// Total number of tracked files
    pub fn file_count(&self) -> usize {
        self.sources.iter().map(|s| s.files.len()).sum()
    }
}
