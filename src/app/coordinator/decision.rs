//! Check-due and download-due decisions
//!
//! Both decisions are pure functions of the stored metadata, the local file
//! state and the clock, so the coordinator and the status report evaluate
//! exactly the same rules.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::models::TrackedFile;

/// Why a tracked file has to be downloaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadReason {
    /// No usable metadata document existed when the session started
    MetadataMissingAtStart,
    /// Local copy is missing or empty
    LocalFileMissing,
    /// Remote copy changed after the last download
    RemoteNewer {
        remote: DateTime<Utc>,
        downloaded: DateTime<Utc>,
    },
    /// A stored timestamp is missing or unparseable
    InvalidTimestamps,
}

impl DownloadReason {
    /// Whether the stored timestamps must be reset before downloading
    pub fn resets_timestamps(&self) -> bool {
        matches!(self, DownloadReason::InvalidTimestamps)
    }
}

impl fmt::Display for DownloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadReason::MetadataMissingAtStart => {
                write!(f, "metadata was not found at startup")
            }
            DownloadReason::LocalFileMissing => write!(f, "local file is missing or empty"),
            DownloadReason::RemoteNewer { remote, downloaded } => write!(
                f,
                "remote file is newer (remote: {}, downloaded: {})",
                remote.to_rfc3339(),
                downloaded.to_rfc3339()
            ),
            DownloadReason::InvalidTimestamps => {
                write!(f, "stored timestamps are missing or invalid")
            }
        }
    }
}

/// Decide whether a tracked file has to be downloaded
///
/// Rules are evaluated in priority order and the first match wins. Returns
/// `None` when the local copy is current.
pub fn download_reason(
    existed_at_start: bool,
    local_valid: bool,
    file: &TrackedFile,
) -> Option<DownloadReason> {
    if !existed_at_start {
        return Some(DownloadReason::MetadataMissingAtStart);
    }

    if !local_valid {
        return Some(DownloadReason::LocalFileMissing);
    }

    match (file.last_download_at(), file.last_modified_remote_at()) {
        (Some(downloaded), Some(remote)) if remote > downloaded => {
            Some(DownloadReason::RemoteNewer { remote, downloaded })
        }
        (Some(_), Some(_)) => None,
        _ => Some(DownloadReason::InvalidTimestamps),
    }
}

/// Decide whether the remote check for a dataset is due
///
/// A stored check time later than `now` (the clock went backwards) cannot be
/// trusted and makes the check due.
pub fn is_check_due(
    last_check: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
    force: bool,
) -> bool {
    if force {
        return true;
    }

    let Some(last_check) = last_check else {
        return true;
    };

    match now.signed_duration_since(last_check).to_std() {
        Ok(elapsed) => elapsed >= cooldown,
        Err(_) => true,
    }
}
