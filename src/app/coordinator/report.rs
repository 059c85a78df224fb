//! Outcome reporting for freshness runs
//!
//! Every failure the coordinator recovers from ends up here instead of being
//! returned as an error, so callers can summarize a run without parsing logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::DownloadReason;

/// How the remote check of one dataset went
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteCheck {
    /// Cooldown had not elapsed; no probe was issued
    Skipped,
    /// Every file was probed successfully and the check time advanced
    Completed,
    /// At least one probe failed; the check time was left unchanged
    Incomplete { failed: usize },
}

/// What happened to one tracked file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// No download was needed
    UpToDate,
    /// A new copy was published
    Downloaded { bytes: u64 },
    /// The transfer failed; the file will be re-evaluated next run
    Failed { error: String },
}

/// Per-file entry of a run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub file_name: String,
    pub reason: Option<DownloadReason>,
    pub outcome: FileOutcome,
}

/// Per-dataset entry of a run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub dataset_id: String,
    pub remote_check: RemoteCheck,
    /// Last remote check after the run
    pub last_remote_check: Option<DateTime<Utc>>,
    pub files: Vec<FileReport>,
}

/// Summary of one coordinator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Instant the run used as "now"
    pub started_at: DateTime<Utc>,
    /// Run was skipped because startup checks are disabled
    pub skipped: bool,
    pub datasets: Vec<DatasetReport>,
    /// Metadata document was saved
    pub persisted: bool,
}

impl RunReport {
    /// Report for a run that did nothing
    pub fn skipped(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            skipped: true,
            datasets: Vec::new(),
            persisted: false,
        }
    }

    /// Whether the run persisted its metadata without any failed transfer
    ///
    /// A skipped run counts as successful.
    pub fn is_success(&self) -> bool {
        self.skipped || (self.persisted && self.failed_count() == 0)
    }

    fn files(&self) -> impl Iterator<Item = &FileReport> {
        self.datasets.iter().flat_map(|d| d.files.iter())
    }

    /// Number of files published during the run
    pub fn downloaded_count(&self) -> usize {
        self.files()
            .filter(|f| matches!(f.outcome, FileOutcome::Downloaded { .. }))
            .count()
    }

    /// Number of failed transfers
    pub fn failed_count(&self) -> usize {
        self.files()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed { .. }))
            .count()
    }

    /// Total bytes published during the run
    pub fn downloaded_bytes(&self) -> u64 {
        self.files()
            .map(|f| match f.outcome {
                FileOutcome::Downloaded { bytes } => bytes,
                _ => 0,
            })
            .sum()
    }

    /// Whether every dataset's remote check completed
    pub fn remote_checks_complete(&self) -> bool {
        self.datasets
            .iter()
            .all(|d| !matches!(d.remote_check, RemoteCheck::Incomplete { .. }))
    }

    /// Last remote check of the first dataset
    pub fn last_remote_check(&self) -> Option<DateTime<Utc>> {
        self.datasets.first().and_then(|d| d.last_remote_check)
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        if self.skipped {
            return "Update checks on startup are disabled; nothing was done".to_string();
        }

        let mut summary = format!(
            "{} downloaded, {} failed",
            self.downloaded_count(),
            self.failed_count()
        );
        if !self.remote_checks_complete() {
            summary.push_str(", remote check incomplete");
        }
        if !self.persisted {
            summary.push_str(", metadata not saved");
        }
        summary
    }
}
