//! Application constants for CSV Mirror
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "CSV-Mirror/0.1.0 (Reference Dataset Sync)";

    /// Timeout for metadata-only (HEAD) requests
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Timeout for a complete file transfer
    pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 10;
}

/// Request spacing
pub mod limits {
    /// Default rate limit for requests against the dataset host (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 4;
}

/// Remote dataset host
pub mod remote {
    /// Template for the download URL of a tracked file.
    ///
    /// `{dataset}` is replaced by the dataset source identifier and `{file}`
    /// by the tracked file name.
    pub const DEFAULT_URL_TEMPLATE: &str =
        "https://huggingface.co/datasets/{dataset}/resolve/main/{file}";

    /// Placeholder for the dataset identifier in the URL template
    pub const DATASET_PLACEHOLDER: &str = "{dataset}";

    /// Placeholder for the file name in the URL template
    pub const FILE_PLACEHOLDER: &str = "{file}";

    /// Dataset mirrored when no configuration says otherwise
    pub const DEFAULT_DATASET_ID: &str = "newtextdoc1111/danbooru-tag-csv";

    /// Files tracked for the default dataset
    pub const DEFAULT_DATASET_FILES: [&str; 2] =
        ["danbooru_tags.csv", "danbooru_tags_cooccurrence.csv"];
}

/// Freshness checking
pub mod freshness {
    use super::Duration;

    /// Minimum time between two remote checks of the same dataset
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(7 * 24 * 60 * 60);
}

/// File operation constants
pub mod files {
    /// Application directory name under the user config directory
    pub const APP_DIR_NAME: &str = "csv-mirror";

    /// Directory holding the published data files
    pub const DATA_DIR_NAME: &str = "data";

    /// Scratch directory for in-flight downloads, inside the data directory
    pub const TEMP_DIR_NAME: &str = ".download";

    /// Metadata document file name
    pub const METADATA_FILE_NAME: &str = "csv_meta.json";

    /// Temporary file suffix for atomic metadata writes
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Extension of files reported as extra datasets by the status report
    pub const CSV_EXTENSION: &str = "csv";
}

/// Metadata document schema
pub mod metadata {
    /// Schema version written to and expected from the metadata document
    pub const SCHEMA_VERSION: u32 = 1;
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file
    pub const LOCAL_CONFIG_FILE: &str = "csv-mirror.toml";

    /// Configuration file name inside the user config directory
    pub const USER_CONFIG_FILE: &str = "config.toml";
}

/// Logging and debugging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

// Re-export commonly used constants for convenience
pub use files::{DATA_DIR_NAME, METADATA_FILE_NAME, TEMP_DIR_NAME};
pub use freshness::DEFAULT_COOLDOWN;
pub use http::{PROBE_TIMEOUT, USER_AGENT};
pub use limits::DEFAULT_RATE_LIMIT_RPS;
pub use metadata::SCHEMA_VERSION;
