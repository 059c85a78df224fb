//! File download operations with atomic publishing
//!
//! A transfer is streamed chunk by chunk into `{temp_dir}/{file_name}` and
//! renamed over the published path only once the whole body has been written
//! and synced. Readers of the published path therefore see either the
//! previous file or the complete new one.
//!
//! When a transfer fails the temporary file is removed, and a published file
//! that looks truncated next to what this transfer expected is removed too so
//! it cannot be mistaken for a valid cached copy.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::{pin_mut, Stream, StreamExt};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::app::client::http::HttpHandler;
use crate::constants::http;
use crate::errors::{DownloadError, DownloadResult};

/// Receives transfer progress; purely informational
pub trait TransferObserver: Send + Sync {
    /// A transfer of `file_name` started; `total` is the announced length
    fn on_start(&self, _file_name: &str, _total: Option<u64>) {}

    /// `transferred` bytes have been written so far
    fn on_progress(&self, _transferred: u64) {}

    /// The transfer ended
    fn on_finish(&self, _succeeded: bool) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

/// Streams files to a scratch directory and publishes them atomically
#[derive(Clone)]
pub struct DownloadExecutor {
    temp_dir: PathBuf,
    timeout: Duration,
    observer: Arc<dyn TransferObserver>,
}

impl std::fmt::Debug for DownloadExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadExecutor")
            .field("temp_dir", &self.temp_dir)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DownloadExecutor {
    /// Creates an executor writing in-flight files to `temp_dir`
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            timeout: http::DOWNLOAD_TIMEOUT,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Bound every transfer, request included, by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Report progress to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Scratch location used while downloading to `final_path`
    pub fn temp_path_for(&self, final_path: &Path) -> PathBuf {
        match final_path.file_name() {
            Some(name) => self.temp_dir.join(name),
            None => self.temp_dir.join("download"),
        }
    }

    /// Download `url` and publish it at `final_path`
    ///
    /// Returns the number of bytes published.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the request, the transfer or the publish
    /// step fails. Cleanup has already happened when the error is returned.
    pub async fn fetch(
        &self,
        http_handler: &HttpHandler,
        url: &Url,
        final_path: &Path,
    ) -> DownloadResult<u64> {
        let deadline = Instant::now() + self.timeout;
        info!("Downloading {} to {}", url, final_path.display());

        let response = match timeout_at(deadline, http_handler.get(url)).await {
            Ok(Ok(response)) if response.status().is_success() => response,
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                return Err(self
                    .fail_before_transfer(final_path, DownloadError::ServerError { status })
                    .await);
            }
            Ok(Err(e)) => {
                return Err(self
                    .fail_before_transfer(final_path, DownloadError::Http(e))
                    .await);
            }
            Err(_) => {
                let err = DownloadError::Timeout {
                    seconds: self.timeout.as_secs(),
                };
                return Err(self.fail_before_transfer(final_path, err).await);
            }
        };

        let expected = response.content_length();
        self.publish_stream_until(response.bytes_stream(), expected, final_path, deadline)
            .await
    }

    /// Write `stream` to the scratch location and publish it at `final_path`
    ///
    /// `expected` is the announced length of the stream, if any. Returns the
    /// number of bytes published.
    pub async fn publish_stream<S, B, E>(
        &self,
        stream: S,
        expected: Option<u64>,
        final_path: &Path,
    ) -> DownloadResult<u64>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<DownloadError>,
    {
        let deadline = Instant::now() + self.timeout;
        self.publish_stream_until(stream, expected, final_path, deadline)
            .await
    }

    async fn publish_stream_until<S, B, E>(
        &self,
        stream: S,
        expected: Option<u64>,
        final_path: &Path,
        deadline: Instant,
    ) -> DownloadResult<u64>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<DownloadError>,
    {
        let temp_path = self.temp_path_for(final_path);
        let display_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut received = 0;

        self.observer.on_start(&display_name, expected);

        let written = match timeout_at(
            deadline,
            self.write_temp(stream, expected, &temp_path, &mut received),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DownloadError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        };

        let result = match written {
            Ok(()) => publish(&temp_path, final_path).await.map(|_| received),
            Err(e) => Err(e),
        };

        match &result {
            Ok(bytes) => info!("Published {} ({} bytes)", final_path.display(), bytes),
            Err(e) => {
                warn!("Download of {} failed: {}", display_name, e);
                cleanup_after_failure(&temp_path, final_path, expected, received).await;
            }
        }

        self.observer.on_finish(result.is_ok());
        result
    }

    async fn write_temp<S, B, E>(
        &self,
        stream: S,
        expected: Option<u64>,
        temp_path: &Path,
        received: &mut u64,
    ) -> DownloadResult<()>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<DownloadError>,
    {
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        remove_if_present(temp_path).await?;

        let mut file = File::create(temp_path).await?;
        pin_mut!(stream);

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return Err(e.into()),
            };
            let bytes = chunk.as_ref();
            file.write_all(bytes).await?;
            *received += bytes.len() as u64;
            self.observer.on_progress(*received);
        }

        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = expected {
            if *received < expected {
                return Err(DownloadError::IncompleteDownload {
                    received: *received,
                    expected,
                });
            }
        }

        debug!("Wrote {} bytes to {}", received, temp_path.display());
        Ok(())
    }

    async fn fail_before_transfer(&self, final_path: &Path, err: DownloadError) -> DownloadError {
        warn!("Download of {} failed: {}", final_path.display(), err);
        cleanup_after_failure(&self.temp_path_for(final_path), final_path, None, 0).await;
        err
    }
}

/// Move a completed temporary file over the published path
async fn publish(temp_path: &Path, final_path: &Path) -> DownloadResult<()> {
    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::rename(temp_path, final_path).await.map_err(|e| {
        error!("Failed to rename temporary file: {}", e);
        DownloadError::AtomicOperationFailed {
            temp_path: temp_path.to_path_buf(),
            final_path: final_path.to_path_buf(),
        }
    })
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed stale file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Whether a published file of `size` bytes cannot be a complete copy
///
/// `expected` is the announced length of the failed transfer (zero counts as
/// unknown) and `received` what it streamed before failing.
pub fn is_inconsistent_size(size: u64, expected: Option<u64>, received: u64) -> bool {
    match expected.filter(|&len| len > 0) {
        _ if size == 0 => true,
        Some(len) => size < len,
        None => received > 0 && size < received,
    }
}

async fn cleanup_after_failure(
    temp_path: &Path,
    final_path: &Path,
    expected: Option<u64>,
    received: u64,
) {
    match remove_if_present(temp_path).await {
        Ok(()) => {}
        Err(e) => error!("Error removing temporary file {}: {}", temp_path.display(), e),
    }

    let size = match fs::metadata(final_path).await {
        Ok(meta) => meta.len(),
        Err(_) => return,
    };

    if is_inconsistent_size(size, expected, received) {
        match fs::remove_file(final_path).await {
            Ok(()) => warn!(
                "Removed potentially corrupted file at {} ({} bytes)",
                final_path.display(),
                size
            ),
            Err(e) => error!(
                "Error removing potentially corrupted file {}: {}",
                final_path.display(),
                e
            ),
        }
    }
}
