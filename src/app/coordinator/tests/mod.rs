//! Unit tests for the freshness coordinator
//!
//! The coordinator runs against a scripted in-memory remote host that counts
//! probes and fetches. Fetches still go through the real download executor,
//! so published files and scratch cleanup are the production code paths.
//! End-to-end tests through the public API live in the top-level tests
//! directory.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream;
use tempfile::TempDir;

use crate::app::client::{DownloadExecutor, RemoteHost};
use crate::app::layout::DataLayout;
use crate::app::metadata::MetadataStore;
use crate::app::models::{format_timestamp, DatasetSource, MetadataDocument};
use crate::constants::files;
use crate::errors::{DownloadResult, ProbeError, ProbeResult};

use super::*;

const DATASET: &str = "owner/tags";
const TAGS: &str = "tags.csv";
const COOCCURRENCE: &str = "cooccurrence.csv";

#[derive(Default)]
struct HostState {
    modified: HashMap<String, DateTime<Utc>>,
    bodies: HashMap<String, Vec<u8>>,
    failing_probes: HashSet<String>,
    failing_fetches: HashSet<String>,
}

/// In-memory remote host with scripted answers
#[derive(Default)]
pub struct ScriptedHost {
    state: Mutex<HostState>,
    probes: AtomicUsize,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl ScriptedHost {
    /// Host serving every tracked file, last modified at `modified`
    pub fn serving(modified: DateTime<Utc>) -> Self {
        let host = Self::default();
        for name in [TAGS, COOCCURRENCE] {
            host.set_remote(name, modified, format!("{},1\n", name).into_bytes());
        }
        host
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_remote(&self, name: &str, modified: DateTime<Utc>, body: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        state.modified.insert(name.to_string(), modified);
        state.bodies.insert(name.to_string(), body);
    }

    pub fn fail_probe(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_probes.insert(name.to_string());
    }

    pub fn fail_fetch(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_fetches.insert(name.to_string());
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteHost for ScriptedHost {
    async fn last_modified(
        &self,
        _dataset_id: &str,
        file_name: &str,
    ) -> ProbeResult<DateTime<Utc>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.enter().await;

        let result = {
            let state = self.state.lock().unwrap();
            if state.failing_probes.contains(file_name) {
                Err(ProbeError::Timeout { seconds: 10 })
            } else {
                state
                    .modified
                    .get(file_name)
                    .copied()
                    .ok_or(ProbeError::MissingLastModified)
            }
        };

        self.leave();
        result
    }

    async fn fetch(
        &self,
        _dataset_id: &str,
        file_name: &str,
        final_path: &Path,
    ) -> DownloadResult<u64> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.enter().await;

        let (body, failing) = {
            let state = self.state.lock().unwrap();
            (
                state.bodies.get(file_name).cloned().unwrap_or_default(),
                state.failing_fetches.contains(file_name),
            )
        };

        let temp_dir = final_path
            .parent()
            .map(|dir| dir.join(files::TEMP_DIR_NAME))
            .unwrap_or_default();
        let executor = DownloadExecutor::new(temp_dir);
        let expected = Some(body.len() as u64);

        let mut chunks: Vec<io::Result<Vec<u8>>> = Vec::new();
        if failing {
            chunks.push(Ok(body[..body.len() / 2].to_vec()));
            chunks.push(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));
        } else {
            chunks.push(Ok(body));
        }

        let result = executor
            .publish_stream(stream::iter(chunks), expected, final_path)
            .await;

        self.leave();
        result
    }
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap()
}

fn sources() -> Vec<DatasetSource> {
    vec![DatasetSource::new(DATASET, [TAGS, COOCCURRENCE])]
}

fn test_config() -> CoordinatorConfig {
    CoordinatorConfig::new(sources()).with_cooldown(Duration::from_secs(7 * 24 * 60 * 60))
}

async fn coordinator_in(dir: &TempDir, host: ScriptedHost) -> FreshnessCoordinator<ScriptedHost> {
    FreshnessCoordinator::new(test_config(), DataLayout::new(dir.path()), host)
        .await
        .unwrap()
}

fn store_in(dir: &TempDir) -> MetadataStore {
    MetadataStore::new(DataLayout::new(dir.path()).metadata_path(), sources())
}

/// Persist a document where every file was downloaded at `downloaded`,
/// last modified remotely at `remote` and checked at `checked`
async fn seed_metadata(
    dir: &TempDir,
    checked: DateTime<Utc>,
    downloaded: DateTime<Utc>,
    remote: DateTime<Utc>,
) -> MetadataDocument {
    let mut document = MetadataDocument::default_for(&sources());
    document.datasets[0].last_remote_check = Some(format_timestamp(checked));
    for file in &mut document.datasets[0].files {
        file.last_download = Some(format_timestamp(downloaded));
        file.last_modified_remote = Some(format_timestamp(remote));
    }
    store_in(dir).save(&document).await.unwrap();
    document
}

fn write_local(dir: &TempDir, name: &str, content: &[u8]) {
    let data_dir = DataLayout::new(dir.path()).data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join(name), content).unwrap();
}

fn read_local(dir: &TempDir, name: &str) -> Option<Vec<u8>> {
    std::fs::read(DataLayout::new(dir.path()).file_path(name)).ok()
}

#[tokio::test]
async fn test_fresh_install_downloads_every_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut coordinator = coordinator_in(&temp_dir, ScriptedHost::serving(at(1))).await;
    assert!(!coordinator.existed_at_start());

    let report = coordinator.run_at(at(10), false).await;

    assert!(report.is_success());
    assert_eq!(report.downloaded_count(), 2);
    assert_eq!(report.datasets[0].remote_check, RemoteCheck::Completed);
    assert_eq!(coordinator.host().probe_count(), 2);
    assert_eq!(coordinator.host().fetch_count(), 2);
    assert_eq!(read_local(&temp_dir, TAGS).unwrap(), b"tags.csv,1\n");

    let saved = store_in(&temp_dir).try_load().await.unwrap();
    let dataset = saved.dataset(DATASET).unwrap();
    assert_eq!(dataset.last_remote_check_at(), Some(at(10)));
    for file in &dataset.files {
        assert_eq!(file.last_download_at(), Some(at(10)));
        assert_eq!(file.last_modified_remote_at(), Some(at(1)));
    }

    assert!(coordinator.existed_at_start());
    assert_eq!(coordinator.last_remote_check(), Some(at(10)));
}

#[tokio::test]
async fn test_missing_metadata_distrusts_valid_files_once() {
    let temp_dir = TempDir::new().unwrap();
    write_local(&temp_dir, TAGS, b"cached");
    write_local(&temp_dir, COOCCURRENCE, b"cached");

    let mut coordinator = coordinator_in(&temp_dir, ScriptedHost::serving(at(1))).await;
    let report = coordinator.run_at(at(10), false).await;

    for file in &report.datasets[0].files {
        assert_eq!(file.reason, Some(DownloadReason::MetadataMissingAtStart));
    }
    assert_eq!(coordinator.host().fetch_count(), 2);

    let second = coordinator.run_at(at(11), false).await;
    assert_eq!(second.downloaded_count(), 0);
    assert_eq!(second.datasets[0].remote_check, RemoteCheck::Skipped);
    assert_eq!(coordinator.host().fetch_count(), 2);
    assert_eq!(coordinator.host().probe_count(), 2);
}

#[tokio::test]
async fn test_cooldown_not_elapsed_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    seed_metadata(&temp_dir, at(8), at(5), at(3)).await;
    write_local(&temp_dir, TAGS, b"cached");
    write_local(&temp_dir, COOCCURRENCE, b"cached");
    let metadata_path = DataLayout::new(temp_dir.path()).metadata_path().to_path_buf();
    let before = std::fs::read_to_string(&metadata_path).unwrap();

    let mut coordinator = coordinator_in(&temp_dir, ScriptedHost::serving(at(20))).await;
    assert!(coordinator.existed_at_start());
    let report = coordinator.run_at(at(10), false).await;

    assert!(report.is_success());
    assert_eq!(report.datasets[0].remote_check, RemoteCheck::Skipped);
    assert_eq!(coordinator.host().probe_count(), 0);
    assert_eq!(coordinator.host().fetch_count(), 0);
    assert_eq!(read_local(&temp_dir, TAGS).unwrap(), b"cached");
    assert_eq!(std::fs::read_to_string(&metadata_path).unwrap(), before);
}

#[tokio::test]
async fn test_newer_remote_file_is_downloaded_again() {
    let temp_dir = TempDir::new().unwrap();
    let mut document = seed_metadata(&temp_dir, at(8), at(5), at(3)).await;
    document.datasets[0].files[0].last_modified_remote = Some(format_timestamp(at(6)));
    store_in(&temp_dir).save(&document).await.unwrap();
    write_local(&temp_dir, TAGS, b"old");
    write_local(&temp_dir, COOCCURRENCE, b"cached");

    let mut coordinator = coordinator_in(&temp_dir, ScriptedHost::serving(at(6))).await;
    let report = coordinator.run_at(at(10), false).await;

    assert_eq!(coordinator.host().probe_count(), 0);
    assert_eq!(coordinator.host().fetch_count(), 1);
    assert_eq!(
        report.datasets[0].files[0].reason,
        Some(DownloadReason::RemoteNewer {
            remote: at(6),
            downloaded: at(5),
        })
    );
    assert_eq!(report.datasets[0].files[1].outcome, FileOutcome::UpToDate);
    assert_eq!(read_local(&temp_dir, TAGS).unwrap(), b"tags.csv,1\n");

    let file = coordinator.document().datasets[0].file(TAGS).unwrap();
    assert_eq!(file.last_download_at(), Some(at(10)));
}

#[tokio::test]
async fn test_missing_or_empty_local_file_is_downloaded() {
    let temp_dir = TempDir::new().unwrap();
    seed_metadata(&temp_dir, at(8), at(5), at(3)).await;
    write_local(&temp_dir, COOCCURRENCE, b"");

    let mut coordinator = coordinator_in(&temp_dir, ScriptedHost::serving(at(3))).await;
    let report = coordinator.run_at(at(10), false).await;

    for file in &report.datasets[0].files {
        assert_eq!(file.reason, Some(DownloadReason::LocalFileMissing));
    }
    assert_eq!(report.downloaded_count(), 2);
    assert!(!read_local(&temp_dir, COOCCURRENCE).unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_timestamps_are_reset_and_healed() {
    let temp_dir = TempDir::new().unwrap();
    let mut document = seed_metadata(&temp_dir, at(8), at(5), at(3)).await;
    document.datasets[0].files[0].last_download = Some("yesterday".to_string());
    store_in(&temp_dir).save(&document).await.unwrap();
    write_local(&temp_dir, TAGS, b"cached");
    write_local(&temp_dir, COOCCURRENCE, b"cached");

    let mut coordinator = coordinator_in(&temp_dir, ScriptedHost::serving(at(3))).await;
    let report = coordinator.run_at(at(10), false).await;

    assert_eq!(
        report.datasets[0].files[0].reason,
        Some(DownloadReason::InvalidTimestamps)
    );
    let file = coordinator.document().datasets[0].file(TAGS).unwrap();
    assert_eq!(file.last_download_at(), Some(at(10)));
    assert_eq!(file.last_modified_remote, None);
}

#[tokio::test]
async fn test_forced_check_advances_when_all_probes_succeed() {
    let temp_dir = TempDir::new().unwrap();
    seed_metadata(&temp_dir, at(8), at(5), at(3)).await;
    write_local(&temp_dir, TAGS, b"cached");
    write_local(&temp_dir, COOCCURRENCE, b"cached");

    let mut coordinator = coordinator_in(&temp_dir, ScriptedHost::serving(at(3))).await;
    let report = coordinator.run_at(at(9), true).await;

    assert_eq!(report.datasets[0].remote_check, RemoteCheck::Completed);
    assert_eq!(report.datasets[0].last_remote_check, Some(at(9)));
    assert_eq!(coordinator.host().probe_count(), 2);
    assert_eq!(coordinator.host().fetch_count(), 0);
}

#[tokio::test]
async fn test_cooldown_elapsed_triggers_check() {
    let temp_dir = TempDir::new().unwrap();
    seed_metadata(&temp_dir, at(1), at(1), at(1)).await;
    write_local(&temp_dir, TAGS, b"cached");
    write_local(&temp_dir, COOCCURRENCE, b"cached");

    let mut coordinator = coordinator_in(&temp_dir, ScriptedHost::serving(at(4))).await;
    let report = coordinator.run_at(at(8), false).await;

    assert_eq!(report.datasets[0].remote_check, RemoteCheck::Completed);
    assert_eq!(coordinator.host().probe_count(), 2);
    // Both files changed remotely after the last download
    assert_eq!(report.downloaded_count(), 2);
}

#[tokio::test]
async fn test_probe_failure_keeps_last_check() {
    let temp_dir = TempDir::new().unwrap();
    seed_metadata(&temp_dir, at(1), at(1), at(1)).await;
    write_local(&temp_dir, TAGS, b"cached");
    write_local(&temp_dir, COOCCURRENCE, b"cached");

    let host = ScriptedHost::serving(at(2));
    host.fail_probe(COOCCURRENCE);
    let mut coordinator = coordinator_in(&temp_dir, host).await;
    let report = coordinator.run_at(at(20), false).await;

    assert_eq!(
        report.datasets[0].remote_check,
        RemoteCheck::Incomplete { failed: 1 }
    );
    assert_eq!(report.datasets[0].last_remote_check, Some(at(1)));
    assert!(!report.remote_checks_complete());

    let dataset = &coordinator.document().datasets[0];
    assert_eq!(
        dataset.file(TAGS).unwrap().last_modified_remote_at(),
        Some(at(2))
    );
    assert_eq!(
        dataset.file(COOCCURRENCE).unwrap().last_modified_remote_at(),
        Some(at(1))
    );
    // The probed file is newer and gets downloaded; the other one is not
    assert_eq!(coordinator.host().fetch_count(), 1);
}

#[tokio::test]
async fn test_failed_download_leaves_metadata_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let mut document = seed_metadata(&temp_dir, at(8), at(5), at(3)).await;
    document.datasets[0].files[0].last_modified_remote = Some(format_timestamp(at(6)));
    store_in(&temp_dir).save(&document).await.unwrap();
    write_local(&temp_dir, TAGS, b"a previous copy that is long enough");
    write_local(&temp_dir, COOCCURRENCE, b"cached");

    let host = ScriptedHost::serving(at(6));
    host.fail_fetch(TAGS);
    let mut coordinator = coordinator_in(&temp_dir, host).await;
    let report = coordinator.run_at(at(10), false).await;

    assert!(!report.is_success());
    assert!(report.persisted);
    assert_eq!(report.failed_count(), 1);
    assert!(matches!(
        report.datasets[0].files[0].outcome,
        FileOutcome::Failed { .. }
    ));

    let file = coordinator.document().datasets[0].file(TAGS).unwrap();
    assert_eq!(file.last_download_at(), Some(at(5)));
    assert_eq!(
        read_local(&temp_dir, TAGS).unwrap(),
        b"a previous copy that is long enough"
    );
    let temp_path = DataLayout::new(temp_dir.path()).temp_path(TAGS);
    assert!(!temp_path.exists());
}

#[tokio::test]
async fn test_disabled_startup_checks_skip_unless_forced() {
    let temp_dir = TempDir::new().unwrap();
    let mut document = seed_metadata(&temp_dir, at(1), at(1), at(1)).await;
    document.check_updates_on_startup = false;
    store_in(&temp_dir).save(&document).await.unwrap();

    let mut coordinator = coordinator_in(&temp_dir, ScriptedHost::serving(at(2))).await;
    let report = coordinator.run_at(at(20), false).await;

    assert!(report.skipped);
    assert!(report.is_success());
    assert_eq!(coordinator.host().probe_count(), 0);
    assert_eq!(coordinator.host().fetch_count(), 0);

    let forced = coordinator.run_at(at(20), true).await;
    assert!(!forced.skipped);
    assert_eq!(coordinator.host().probe_count(), 2);
    assert_eq!(forced.downloaded_count(), 2);
}

#[tokio::test]
async fn test_persist_failure_keeps_distrusting_files() {
    let temp_dir = TempDir::new().unwrap();
    // A directory where the metadata file should be makes every save fail
    std::fs::create_dir_all(DataLayout::new(temp_dir.path()).metadata_path()).unwrap();

    let mut coordinator = coordinator_in(&temp_dir, ScriptedHost::serving(at(1))).await;
    let report = coordinator.run_at(at(10), false).await;

    assert!(!report.persisted);
    assert!(!report.is_success());
    assert_eq!(report.downloaded_count(), 2);
    assert!(!coordinator.existed_at_start());

    let second = coordinator.run_at(at(11), false).await;
    for file in &second.datasets[0].files {
        assert_eq!(file.reason, Some(DownloadReason::MetadataMissingAtStart));
    }
}

#[tokio::test]
async fn test_datasets_are_checked_independently() {
    let temp_dir = TempDir::new().unwrap();
    let config = CoordinatorConfig::new(vec![
        DatasetSource::new(DATASET, [TAGS]),
        DatasetSource::new("owner/extra", [COOCCURRENCE]),
    ]);

    let mut document = MetadataDocument::default_for(&config.sources);
    document.datasets[0].last_remote_check = Some(format_timestamp(at(9)));
    document.datasets[0].files[0].last_download = Some(format_timestamp(at(9)));
    document.datasets[0].files[0].last_modified_remote = Some(format_timestamp(at(1)));
    MetadataStore::new(
        DataLayout::new(temp_dir.path()).metadata_path(),
        config.sources.clone(),
    )
    .save(&document)
    .await
    .unwrap();
    write_local(&temp_dir, TAGS, b"cached");

    let host = ScriptedHost::serving(at(1));
    let mut coordinator = FreshnessCoordinator::new(config, DataLayout::new(temp_dir.path()), host)
        .await
        .unwrap();
    let report = coordinator.run_at(at(10), false).await;

    assert_eq!(report.datasets[0].remote_check, RemoteCheck::Skipped);
    assert_eq!(report.datasets[1].remote_check, RemoteCheck::Completed);
    assert_eq!(report.datasets[1].last_remote_check, Some(at(10)));
    assert_eq!(coordinator.host().probe_count(), 1);
    assert_eq!(report.datasets[0].files[0].outcome, FileOutcome::UpToDate);
    assert_eq!(report.downloaded_count(), 1);
    assert_eq!(coordinator.last_remote_check(), Some(at(9)));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = CoordinatorConfig::new(vec![DatasetSource::new(DATASET, ["a/b.csv"])]);

    let result =
        FreshnessCoordinator::new(config, DataLayout::new(temp_dir.path()), ScriptedHost::default())
            .await;
    assert!(matches!(result, Err(e) if e.category() == "config"));
}

#[tokio::test]
async fn test_service_serializes_overlapping_triggers() {
    let temp_dir = TempDir::new().unwrap();
    let host = ScriptedHost::serving(at(1)).with_delay(Duration::from_millis(20));
    let service = Arc::new(FreshnessService::new(coordinator_in(&temp_dir, host).await));

    let startup = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.trigger_at(at(10), false).await })
    };
    let on_demand = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.trigger_at(at(10), true).await })
    };

    let (startup, on_demand) = (startup.await.unwrap(), on_demand.await.unwrap());
    assert!(startup.success);
    assert!(on_demand.success);
    assert_eq!(startup.last_remote_check, Some(at(10)));
    assert_eq!(service.last_remote_check().await, Some(at(10)));

    let coordinator = Arc::try_unwrap(service).ok().unwrap().into_inner();
    assert_eq!(coordinator.host().max_in_flight(), 1);
    // The first run downloads both files, the second one finds them current
    assert_eq!(coordinator.host().fetch_count(), 2);
}

#[tokio::test]
async fn test_trigger_reports_skipped_run() {
    let temp_dir = TempDir::new().unwrap();
    let mut document = seed_metadata(&temp_dir, at(3), at(3), at(1)).await;
    document.check_updates_on_startup = false;
    store_in(&temp_dir).save(&document).await.unwrap();

    let service = FreshnessService::new(coordinator_in(&temp_dir, ScriptedHost::default()).await);
    let response = service.trigger_at(at(20), false).await;

    assert!(response.success);
    assert!(response.report.skipped);
    assert_eq!(response.last_remote_check, Some(at(3)));
    assert!(response.message.contains("disabled"));
}
