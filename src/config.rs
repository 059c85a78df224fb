//! Configuration management for CSV Mirror
//!
//! This module provides TOML configuration with multi-source loading and
//! zero-config defaults. Without any file the mirror tracks the default
//! dataset below the user config directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ClientConfig, CoordinatorConfig, DataLayout, DatasetSource};
use crate::constants::{config, files, freshness, http, limits, logging, remote};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Storage location
    pub storage: StorageConfig,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Freshness coordinator settings
    pub coordinator: CoordinatorConfigToml,
    /// Tracked datasets
    pub datasets: Vec<DatasetSource>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            client: ClientConfigToml::default(),
            coordinator: CoordinatorConfigToml::default(),
            datasets: DatasetSource::default_sources(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Mirror root (None = user config directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// Download URL template with `{dataset}` and `{file}` placeholders
    pub url_template: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// Timeout for metadata-only requests
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
    /// Timeout for a complete file transfer
    #[serde(with = "humantime_serde")]
    pub download_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            url_template: remote::DEFAULT_URL_TEMPLATE.to_string(),
            user_agent: http::USER_AGENT.to_string(),
            probe_timeout: http::PROBE_TIMEOUT,
            download_timeout: http::DOWNLOAD_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

/// TOML-friendly coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfigToml {
    /// Minimum time between two remote checks of a dataset
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
    /// Show a progress bar while downloading
    pub show_progress: bool,
}

impl Default for CoordinatorConfigToml {
    fn default() -> Self {
        Self {
            cooldown: freshness::DEFAULT_COOLDOWN,
            show_progress: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Explicit config file, which must exist
    /// 3. Otherwise the first config file found in the standard locations
    pub async fn load(config_file_override: Option<&Path>) -> ConfigResult<Self> {
        match Self::locate(config_file_override)? {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Resolve which config file [`load`](Self::load) reads, if any
    pub fn locate(config_file_override: Option<&Path>) -> ConfigResult<Option<PathBuf>> {
        if let Some(path) = config_file_override {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            return Ok(Some(path.to_path_buf()));
        }

        let mut search_paths = vec![PathBuf::from(config::LOCAL_CONFIG_FILE)];
        if let Ok(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Ok(Some(path));
            }
        }

        Ok(None)
    }

    /// Get the default config file path for the current user
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir
            .join(files::APP_DIR_NAME)
            .join(config::USER_CONFIG_FILE))
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Write the commented default configuration to `path`
    ///
    /// Refuses to replace an existing file unless `force` is set.
    pub async fn write_default(path: &Path, force: bool) -> ConfigResult<()> {
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }

        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        tokio::fs::write(path, Self::generate_default_config_content())
            .await
            .map_err(io_err)?;

        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    /// Override the storage root, as given on the command line
    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        if root.is_some() {
            self.storage.root = root;
        }
        self
    }

    /// Resolved storage root
    pub fn storage_root(&self) -> ConfigResult<PathBuf> {
        match &self.storage.root {
            Some(root) => Ok(root.clone()),
            None => DataLayout::default_root(),
        }
    }

    /// Storage layout below the resolved root
    pub fn layout(&self) -> ConfigResult<DataLayout> {
        Ok(DataLayout::new(self.storage_root()?))
    }

    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> (ClientConfig, CoordinatorConfig) {
        (
            self.client.to_runtime_config(),
            CoordinatorConfig {
                cooldown: self.coordinator.cooldown,
                sources: self.datasets.clone(),
            },
        )
    }

    /// Validate the configuration, collecting every problem found
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.client.rate_limit_rps == 0 {
            errors.push("client.rate_limit_rps must be greater than zero".to_string());
        }
        for (field, value) in [
            ("client.probe_timeout", self.client.probe_timeout),
            ("client.download_timeout", self.client.download_timeout),
            ("client.connect_timeout", self.client.connect_timeout),
        ] {
            if value.is_zero() {
                errors.push(format!("{} must be greater than zero", field));
            }
        }
        for placeholder in [remote::DATASET_PLACEHOLDER, remote::FILE_PLACEHOLDER] {
            if !self.client.url_template.contains(placeholder) {
                errors.push(format!("client.url_template must contain {}", placeholder));
            }
        }

        let (_, coordinator) = self.to_runtime_config();
        if let Err(e) = coordinator.validate() {
            errors.push(e.to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        let default_root = DataLayout::default_root()
            .map(|root| root.display().to_string())
            .unwrap_or_else(|_| "<user config dir>/csv-mirror".to_string());

        let file_list = remote::DEFAULT_DATASET_FILES
            .iter()
            .map(|name| format!("\"{}\"", name))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"# CSV Mirror Configuration
# You can customize any of these settings to suit your needs.

[storage]
# Mirror root holding {metadata} and the {data}/ directory
# Default: {default_root}
# root = "/path/to/mirror"

[client]
# Download URL; {{dataset}} and {{file}} are substituted per tracked file
url_template = "{url_template}"
user_agent = "{user_agent}"
probe_timeout = "10s"
download_timeout = "10m"
connect_timeout = "30s"
# Requests per second against the dataset host
rate_limit_rps = {rate_limit}

[coordinator]
# Minimum time between two remote checks, unless forced
cooldown = "7days"
show_progress = true

# One table per dataset; file names must be unique across all datasets
[[datasets]]
id = "{dataset}"
files = [{file_list}]

[logging]
level = "{level}"  # error, warn, info, debug, trace
"#,
            metadata = files::METADATA_FILE_NAME,
            data = files::DATA_DIR_NAME,
            default_root = default_root,
            url_template = remote::DEFAULT_URL_TEMPLATE,
            user_agent = http::USER_AGENT,
            rate_limit = limits::DEFAULT_RATE_LIMIT_RPS,
            dataset = remote::DEFAULT_DATASET_ID,
            file_list = file_list,
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            url_template: self.url_template.clone(),
            user_agent: self.user_agent.clone(),
            probe_timeout: self.probe_timeout,
            download_timeout: self.download_timeout,
            connect_timeout: self.connect_timeout,
            rate_limit_rps: self.rate_limit_rps,
            ..ClientConfig::default()
        }
    }
}
