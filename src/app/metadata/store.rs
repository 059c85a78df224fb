//! Loading and persisting the metadata document

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::app::models::{DatasetSource, MetadataDocument};
use crate::constants::{files, metadata};
use crate::errors::{display_chain, MetadataError, MetadataResult, PersistError, PersistResult};

/// Result of loading the metadata document at session start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedMetadata {
    /// Usable document, completed with any configured entries it lacked
    pub document: MetadataDocument,
    /// Whether a valid document was found on disk
    pub existed_at_start: bool,
}

/// Sole reader and writer of the metadata file
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
    sources: Vec<DatasetSource>,
}

impl MetadataStore {
    /// Create a store for the document at `path` tracking `sources`
    pub fn new(path: impl Into<PathBuf>, sources: Vec<DatasetSource>) -> Self {
        Self {
            path: path.into(),
            sources,
        }
    }

    /// Location of the metadata file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Built-in document for the configured sources
    pub fn default_document(&self) -> MetadataDocument {
        MetadataDocument::default_for(&self.sources)
    }

    /// Load the persisted document, falling back to the default
    pub async fn load(&self) -> LoadedMetadata {
        match self.try_load().await {
            Ok(mut document) => {
                let added = document.reconcile(&self.sources);
                if added > 0 {
                    info!(
                        "Added {} newly configured file(s) to metadata from {}",
                        added,
                        self.path.display()
                    );
                }
                debug!("Loaded metadata from {}", self.path.display());
                LoadedMetadata {
                    document,
                    existed_at_start: true,
                }
            }
            Err(MetadataError::NotFound { path }) => {
                info!(
                    "Metadata file not found: {}. Using default metadata",
                    path.display()
                );
                self.fallback()
            }
            Err(e) => {
                warn!(
                    "Metadata at {} is unusable ({}). Using default metadata",
                    self.path.display(),
                    display_chain(&e)
                );
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> LoadedMetadata {
        LoadedMetadata {
            document: self.default_document(),
            existed_at_start: false,
        }
    }

    /// Read and validate the persisted document without any fallback
    pub async fn try_load(&self) -> MetadataResult<MetadataDocument> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MetadataError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(MetadataError::Io(e)),
        };

        let value: serde_json::Value = serde_json::from_str(&content)?;
        match value.get("version") {
            None => return Err(MetadataError::MissingVersion),
            Some(version) if schema_version(version) != Some(metadata::SCHEMA_VERSION) => {
                return Err(MetadataError::VersionMismatch {
                    expected: metadata::SCHEMA_VERSION,
                    found: version.to_string(),
                });
            }
            Some(_) => {}
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Persist the full document, replacing the previous file atomically
    pub async fn save(&self, document: &MetadataDocument) -> PersistResult<()> {
        let content = serde_json::to_string_pretty(document)?;
        let temp_path = self.temp_path();
        let io_err = |source| PersistError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        let write = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &self.path).await
        };

        if let Err(e) = write.await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_err(e));
        }

        debug!("Saved metadata to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| files::METADATA_FILE_NAME.into());
        name.push(files::TEMP_FILE_SUFFIX);
        self.path.with_file_name(name)
    }
}

/// Integral schema version; `1.0` counts as `1`
fn schema_version(value: &serde_json::Value) -> Option<u32> {
    if let Some(version) = value.as_u64() {
        return u32::try_from(version).ok();
    }
    value
        .as_f64()
        .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= f64::from(u32::MAX))
        .map(|v| v as u32)
}
