//! Error types for CSV Mirror
//!
//! One enum per failure domain of the freshness subsystem, plus a top-level
//! [`AppError`]. None of the domain errors is fatal: the coordinator recovers
//! from each of them locally and only reports them. Configuration errors are
//! the only ones expected to reach `main`.

use std::path::PathBuf;
use thiserror::Error;

/// The persisted metadata document could not be used
#[derive(Error, Debug)]
pub enum MetadataError {
    /// Metadata file does not exist
    #[error("Metadata file not found: {path}")]
    NotFound { path: PathBuf },

    /// Metadata file exists but could not be read
    #[error("Failed to read metadata file")]
    Io(#[from] std::io::Error),

    /// Metadata file is not valid JSON for the document schema
    #[error("Metadata file is not a valid document")]
    JsonParse(#[from] serde_json::Error),

    /// Metadata document has no version tag
    #[error("Metadata document has no version field")]
    MissingVersion,

    /// Metadata document was written for another schema version
    #[error("Metadata version mismatch. Expected: {expected}, found: {found}")]
    VersionMismatch { expected: u32, found: String },
}

/// A metadata-only request for a remote file did not yield a timestamp
#[derive(Error, Debug)]
pub enum ProbeError {
    /// HTTP request failed
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Request did not complete within the probe timeout
    #[error("Remote probe timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Server answered with a non-success status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Response carried no Last-Modified header
    #[error("Last-Modified header missing from response")]
    MissingLastModified,

    /// Last-Modified header could not be parsed as an HTTP date
    #[error("Invalid Last-Modified header: {value}")]
    InvalidLastModified { value: String },

    /// URL could not be built for the file
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },
}

/// A file transfer did not complete
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP request error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations
    #[error("File I/O error")]
    Io(#[from] std::io::Error),

    /// Download timeout
    #[error("Download timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Stream ended before the announced Content-Length was reached
    #[error("Incomplete download: received {received} bytes, expected {expected} bytes")]
    IncompleteDownload { received: u64, expected: u64 },

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },
}

/// The metadata document could not be written
#[derive(Error, Debug)]
pub enum PersistError {
    /// Writing or renaming the metadata file failed
    #[error("Failed to write metadata file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document could not be serialized
    #[error("Failed to serialize metadata document")]
    Serialize(#[from] serde_json::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered as TOML
    #[error("Failed to render configuration")]
    Render(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Tracked file name that cannot be used as a local file name
    #[error("Invalid tracked file name '{name}' in dataset {dataset}")]
    InvalidFileName { dataset: String, name: String },

    /// Same file name tracked more than once
    #[error("File '{name}' is tracked more than once; local paths must be unique")]
    DuplicateFile { name: String },

    /// Refusing to overwrite an existing configuration file
    #[error("Configuration file already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// Configuration validation failed
    #[error("Configuration validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },

    /// No usable user directory could be determined
    #[error("Could not determine user config directory")]
    NoConfigDir,
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Metadata error
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Probe error
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Persist error
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is expected to clear up on a later cycle
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Probe(_)
            | AppError::Download(_)
            | AppError::Persist(_)
            | AppError::Metadata(_) => true,

            AppError::Config(_) | AppError::Io(_) | AppError::Generic { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Metadata(_) => "metadata",
            AppError::Probe(_) => "probe",
            AppError::Download(_) => "download",
            AppError::Persist(_) => "persist",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Render an error followed by its chain of sources, separated by ": "
pub fn display_chain(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Metadata result type alias
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Probe result type alias
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Persist result type alias
pub type PersistResult<T> = std::result::Result<T, PersistError>;

/// Config result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
