//! Local storage layout
//!
//! Every path the subsystem touches is derived here from a single root:
//!
//! ```text
//! {root}/csv_meta.json          metadata document
//! {root}/data/{file_name}       published data files
//! {root}/data/.download/{file}  in-flight downloads
//! ```

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::constants::files;
use crate::errors::{ConfigError, ConfigResult};

/// Resolved directories and files for one mirror root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
    data_dir: PathBuf,
    temp_dir: PathBuf,
    metadata_path: PathBuf,
}

impl DataLayout {
    /// Build the layout below `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let data_dir = root.join(files::DATA_DIR_NAME);
        let temp_dir = data_dir.join(files::TEMP_DIR_NAME);
        let metadata_path = root.join(files::METADATA_FILE_NAME);
        Self {
            root,
            data_dir,
            temp_dir,
            metadata_path,
        }
    }

    /// Default root for the current user
    ///
    /// - macOS: ~/Library/Application Support/csv-mirror
    /// - Linux: ~/.config/csv-mirror
    /// - Windows: %APPDATA%/csv-mirror
    pub fn default_root() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(files::APP_DIR_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Mirror root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding published files
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Scratch directory for in-flight downloads
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Metadata document location
    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Published location of a tracked file
    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    /// Download location of a tracked file
    pub fn temp_path(&self, file_name: &str) -> PathBuf {
        self.temp_dir.join(file_name)
    }

    /// Create the data and scratch directories if needed
    pub async fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [&self.data_dir, &self.temp_dir] {
            if !dir.exists() {
                fs::create_dir_all(dir).await?;
                debug!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }
}

/// Whether a published file is usable: present and non-empty
pub async fn is_valid_local_file(path: &Path) -> bool {
    match fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Whether a tracked file name maps to exactly one file inside the data directory
pub fn is_plain_file_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && Path::new(name).file_name().map(|n| n == name).unwrap_or(false)
}
