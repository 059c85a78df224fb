//! Read-only view of the mirror
//!
//! Collects what is on disk and what the metadata says, and which files the
//! next run would download, without touching the network or writing anything.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tracing::debug;

use crate::app::coordinator::{download_reason, is_check_due, CoordinatorConfig, DownloadReason};
use crate::app::layout::DataLayout;
use crate::app::metadata::LoadedMetadata;
use crate::app::models::TrackedFile;
use crate::constants::files;

/// State of one tracked file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    pub file_name: String,
    pub path: PathBuf,
    pub exists: bool,
    pub size: Option<u64>,
    /// Stored values, verbatim
    pub last_download: Option<String>,
    pub last_modified_remote: Option<String>,
    /// Why the next run would download the file, if it would
    pub would_download: Option<DownloadReason>,
}

/// State of one configured dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetStatus {
    pub dataset_id: String,
    pub last_remote_check: Option<DateTime<Utc>>,
    /// Whether the next non-forced run would probe the remote host
    pub check_due: bool,
    pub files: Vec<FileStatus>,
}

/// Snapshot of the whole mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub root: PathBuf,
    pub metadata_exists: bool,
    pub check_updates_on_startup: bool,
    pub datasets: Vec<DatasetStatus>,
    /// Untracked CSV files found in the data directory, sorted by name
    pub extra_files: Vec<String>,
}

impl StatusReport {
    /// Last remote check of the first configured dataset
    pub fn last_check_time(&self) -> Option<DateTime<Utc>> {
        self.datasets.first().and_then(|d| d.last_remote_check)
    }

    /// Number of tracked files the next run would download
    pub fn pending_downloads(&self) -> usize {
        self.datasets
            .iter()
            .flat_map(|d| d.files.iter())
            .filter(|f| f.would_download.is_some())
            .count()
    }
}

/// Collect the status of every configured dataset as of `now`
pub async fn collect(
    layout: &DataLayout,
    loaded: &LoadedMetadata,
    config: &CoordinatorConfig,
    now: DateTime<Utc>,
) -> StatusReport {
    let mut datasets = Vec::with_capacity(config.sources.len());

    for source in &config.sources {
        let tracked = loaded.document.dataset(&source.id);
        let last_remote_check = tracked.and_then(|d| d.last_remote_check_at());

        let mut file_statuses = Vec::with_capacity(source.files.len());
        for file_name in &source.files {
            let path = layout.file_path(file_name);
            let size = match fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => Some(meta.len()),
                _ => None,
            };
            let local_valid = size.map(|s| s > 0).unwrap_or(false);

            let entry = tracked
                .and_then(|d| d.file(file_name))
                .cloned()
                .unwrap_or_else(|| TrackedFile::new(file_name.as_str()));
            let would_download = download_reason(loaded.existed_at_start, local_valid, &entry);

            file_statuses.push(FileStatus {
                file_name: file_name.clone(),
                path,
                exists: size.is_some(),
                size,
                last_download: entry.last_download,
                last_modified_remote: entry.last_modified_remote,
                would_download,
            });
        }

        datasets.push(DatasetStatus {
            dataset_id: source.id.clone(),
            last_remote_check,
            check_due: is_check_due(last_remote_check, now, config.cooldown, false),
            files: file_statuses,
        });
    }

    let tracked_names: HashSet<&str> = config
        .sources
        .iter()
        .flat_map(|s| s.files.iter().map(String::as_str))
        .collect();

    StatusReport {
        root: layout.root().to_path_buf(),
        metadata_exists: loaded.existed_at_start,
        check_updates_on_startup: loaded.document.check_updates_on_startup,
        datasets,
        extra_files: extra_csv_files(layout, &tracked_names).await,
    }
}

/// CSV files in the data directory that no dataset tracks
async fn extra_csv_files(layout: &DataLayout, tracked: &HashSet<&str>) -> Vec<String> {
    let mut entries = match fs::read_dir(layout.data_dir()).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", layout.data_dir().display(), e);
            return Vec::new();
        }
    };

    let mut extra = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let path = entry.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(files::CSV_EXTENSION))
            .unwrap_or(false);
        if !is_csv || !is_file {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if !tracked.contains(name) {
                extra.push(name.to_string());
            }
        }
    }

    extra.sort();
    extra
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{format_timestamp, DatasetSource, MetadataDocument};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn config() -> CoordinatorConfig {
        CoordinatorConfig::new(vec![DatasetSource::new("owner/tags", ["a.csv", "b.csv"])])
    }

    #[tokio::test]
    async fn test_status_of_fresh_mirror() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::new(temp_dir.path());
        let loaded = LoadedMetadata {
            document: MetadataDocument::default_for(&config().sources),
            existed_at_start: false,
        };

        let report = collect(&layout, &loaded, &config(), Utc::now()).await;

        assert!(!report.metadata_exists);
        assert_eq!(report.last_check_time(), None);
        assert!(report.datasets[0].check_due);
        assert_eq!(report.pending_downloads(), 2);
        assert!(report.extra_files.is_empty());
        assert!(!report.datasets[0].files[0].exists);
    }

    #[tokio::test]
    async fn test_status_of_current_mirror() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::new(temp_dir.path());
        layout.ensure_directories().await.unwrap();

        let checked = Utc.with_ymd_and_hms(2025, 1, 9, 0, 0, 0).unwrap();
        let mut document = MetadataDocument::default_for(&config().sources);
        document.datasets[0].last_remote_check = Some(format_timestamp(checked));
        for file in &mut document.datasets[0].files {
            file.last_download = Some(format_timestamp(checked));
            file.last_modified_remote = Some(format_timestamp(checked));
        }
        let loaded = LoadedMetadata {
            document,
            existed_at_start: true,
        };

        fs::write(layout.file_path("a.csv"), b"tag,count\n").await.unwrap();
        fs::write(layout.file_path("z_extra.csv"), b"x").await.unwrap();
        fs::write(layout.file_path("m_extra.CSV"), b"x").await.unwrap();
        fs::write(layout.file_path("notes.txt"), b"x").await.unwrap();

        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let report = collect(&layout, &loaded, &config(), now).await;

        assert_eq!(report.last_check_time(), Some(checked));
        assert!(!report.datasets[0].check_due);

        let a = &report.datasets[0].files[0];
        assert_eq!(a.size, Some(10));
        assert_eq!(a.would_download, None);

        let b = &report.datasets[0].files[1];
        assert!(!b.exists);
        assert_eq!(b.would_download, Some(DownloadReason::LocalFileMissing));

        assert_eq!(report.extra_files, vec!["m_extra.CSV", "z_extra.csv"]);
    }
}
