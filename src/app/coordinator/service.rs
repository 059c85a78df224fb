//! Single-flight trigger surface
//!
//! A startup run and an on-demand forced run must never write the same
//! temporary or final paths at once. The service serializes them behind one
//! async mutex; a trigger arriving during a run waits for it to finish and
//! then runs itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::report::RunReport;
use super::FreshnessCoordinator;
use crate::app::client::RemoteHost;

/// Result of one trigger, shaped for external callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
    /// Last remote check of the first dataset after the run
    pub last_remote_check: Option<DateTime<Utc>>,
    pub report: RunReport,
}

impl From<RunReport> for TriggerResponse {
    fn from(report: RunReport) -> Self {
        let success = report.is_success();
        let message = if success {
            format!("Check completed: {}", report.summary())
        } else {
            format!("Check finished with problems: {}", report.summary())
        };
        Self {
            success,
            message,
            last_remote_check: report.last_remote_check(),
            report,
        }
    }
}

/// Serialized access to one coordinator
pub struct FreshnessService<H: RemoteHost> {
    coordinator: Mutex<FreshnessCoordinator<H>>,
}

impl<H: RemoteHost> FreshnessService<H> {
    pub fn new(coordinator: FreshnessCoordinator<H>) -> Self {
        Self {
            coordinator: Mutex::new(coordinator),
        }
    }

    /// Run one cycle now, waiting for any run already in progress
    pub async fn trigger(&self, force: bool) -> TriggerResponse {
        self.trigger_at(Utc::now(), force).await
    }

    /// Like [`trigger`](Self::trigger) with an explicit clock
    pub async fn trigger_at(&self, now: DateTime<Utc>, force: bool) -> TriggerResponse {
        let mut coordinator = self.coordinator.lock().await;
        debug!("Acquired coordinator for triggered run (force: {})", force);

        let report = coordinator.run_at(now, force).await;
        let mut response = TriggerResponse::from(report);
        // A skipped run carries no dataset reports
        response.last_remote_check = coordinator.last_remote_check();
        response
    }

    /// Last remote check of the first dataset, waiting for any active run
    pub async fn last_remote_check(&self) -> Option<DateTime<Utc>> {
        self.coordinator.lock().await.last_remote_check()
    }

    /// Give back the coordinator
    pub fn into_inner(self) -> FreshnessCoordinator<H> {
        self.coordinator.into_inner()
    }
}
