//! Data models for CSV Mirror
//!
//! This module defines the tracked dataset configuration and the persisted
//! metadata document. Timestamps are kept as the raw strings found on disk so
//! that a corrupt value survives loading and can be healed by the download
//! decision instead of discarding the whole document.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{metadata, remote};

/// A remote collection and the file names mirrored from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSource {
    /// Dataset identifier on the remote host (e.g., "owner/dataset-name")
    pub id: String,
    /// Tracked file names, unique across all sources
    pub files: Vec<String>,
}

impl DatasetSource {
    /// Create a source from an identifier and its file names
    pub fn new<I, S>(id: impl Into<String>, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    /// The source mirrored by default
    pub fn default_sources() -> Vec<Self> {
        vec![Self::new(
            remote::DEFAULT_DATASET_ID,
            remote::DEFAULT_DATASET_FILES,
        )]
    }
}

/// Freshness metadata for one mirrored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    /// File name, also the name of the local copy
    pub file_name: String,
    /// When the local copy was last published
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_download: Option<String>,
    /// Last-Modified reported by the remote host at the last successful probe
    #[serde(
        default,
        rename = "last_modified_on_hf",
        deserialize_with = "lenient_timestamp"
    )]
    pub last_modified_remote: Option<String>,
}

impl TrackedFile {
    /// Create an entry with no history
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            last_download: None,
            last_modified_remote: None,
        }
    }

    /// Parsed last download instant, if present and valid
    pub fn last_download_at(&self) -> Option<DateTime<Utc>> {
        self.last_download.as_deref().and_then(parse_timestamp)
    }

    /// Parsed remote modification instant, if present and valid
    pub fn last_modified_remote_at(&self) -> Option<DateTime<Utc>> {
        self.last_modified_remote.as_deref().and_then(parse_timestamp)
    }

    /// Forget both timestamps
    pub fn clear_timestamps(&mut self) {
        self.last_download = None;
        self.last_modified_remote = None;
    }
}

/// Freshness metadata for one dataset source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedDataset {
    /// Dataset identifier on the remote host
    #[serde(rename = "hf_dataset_id")]
    pub source_id: String,
    /// When every file of the dataset was last probed successfully
    #[serde(
        default,
        rename = "last_remote_check_timestamp",
        deserialize_with = "lenient_timestamp"
    )]
    pub last_remote_check: Option<String>,
    /// Tracked files, in configuration order
    #[serde(default, rename = "csv_files")]
    pub files: Vec<TrackedFile>,
}

impl TrackedDataset {
    /// Create an entry for a configured source with no history
    pub fn from_source(source: &DatasetSource) -> Self {
        Self {
            source_id: source.id.clone(),
            last_remote_check: None,
            files: source.files.iter().map(TrackedFile::new).collect(),
        }
    }

    /// Parsed last remote check instant, if present and valid
    pub fn last_remote_check_at(&self) -> Option<DateTime<Utc>> {
        self.last_remote_check.as_deref().and_then(parse_timestamp)
    }

    /// Record a completed remote check.
    ///
    /// The stored instant never moves backwards, even when the wall clock does.
    pub fn advance_remote_check(&mut self, now: DateTime<Utc>) {
        let next = match self.last_remote_check_at() {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        self.last_remote_check = Some(format_timestamp(next));
    }

    /// Look up a tracked file by name
    pub fn file(&self, file_name: &str) -> Option<&TrackedFile> {
        self.files.iter().find(|f| f.file_name == file_name)
    }

    /// Tracked file by name, appending an empty entry if it is missing
    pub fn file_entry(&mut self, file_name: &str) -> &mut TrackedFile {
        let index = match self.files.iter().position(|f| f.file_name == file_name) {
            Some(index) => index,
            None => {
                self.files.push(TrackedFile::new(file_name));
                self.files.len() - 1
            }
        };
        &mut self.files[index]
    }
}

/// Versioned container of all tracked datasets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    /// Schema version
    pub version: u32,
    /// Whether a non-forced run should check and download at all
    #[serde(default = "default_true")]
    pub check_updates_on_startup: bool,
    /// Tracked datasets
    #[serde(default, rename = "hf_datasets")]
    pub datasets: Vec<TrackedDataset>,
}

fn default_true() -> bool {
    true
}

impl MetadataDocument {
    /// Built-in document for the given sources: nothing downloaded, nothing checked
    pub fn default_for(sources: &[DatasetSource]) -> Self {
        Self {
            version: metadata::SCHEMA_VERSION,
            check_updates_on_startup: true,
            datasets: sources.iter().map(TrackedDataset::from_source).collect(),
        }
    }

    /// Append entries for configured datasets and files the document lacks.
    ///
    /// Existing entries, including ones no longer configured, are kept as is.
    /// Returns the number of file entries added.
    pub fn reconcile(&mut self, sources: &[DatasetSource]) -> usize {
        let mut added = 0;
        for source in sources {
            match self.dataset_mut(&source.id) {
                Some(dataset) => {
                    for name in &source.files {
                        if dataset.file(name).is_none() {
                            dataset.files.push(TrackedFile::new(name));
                            added += 1;
                        }
                    }
                }
                None => {
                    self.datasets.push(TrackedDataset::from_source(source));
                    added += source.files.len();
                }
            }
        }
        added
    }

    /// Look up a dataset by source identifier
    pub fn dataset(&self, source_id: &str) -> Option<&TrackedDataset> {
        self.datasets.iter().find(|d| d.source_id == source_id)
    }

    /// Look up a dataset by source identifier, mutably
    pub fn dataset_mut(&mut self, source_id: &str) -> Option<&mut TrackedDataset> {
        self.datasets.iter_mut().find(|d| d.source_id == source_id)
    }

    /// Dataset by source identifier, appending an empty entry if it is missing
    pub fn dataset_entry(&mut self, source_id: &str) -> &mut TrackedDataset {
        let index = match self.datasets.iter().position(|d| d.source_id == source_id) {
            Some(index) => index,
            None => {
                self.datasets.push(TrackedDataset {
                    source_id: source_id.to_string(),
                    last_remote_check: None,
                    files: Vec::new(),
                });
                self.datasets.len() - 1
            }
        };
        &mut self.datasets[index]
    }
}

/// Accept any JSON value where a timestamp is stored
///
/// Non-string values are kept in their JSON rendering, which never parses as
/// a timestamp, so only the affected entry is reset instead of the document.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(value) => Some(value),
        other => Some(other.to_string()),
    })
}

/// Parse a stored timestamp; values without an explicit offset are rejected
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format an instant the way it is stored in the metadata document
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}
