//! Single-file transfer engine.
//!
//! One [`FileDownload`] is bound to one remote file and one local path.
//! Construction probes the remote size (`SIZE`, bounded attempts, each
//! with a timeout). [`FileDownload::download`] then streams fixed-size
//! blocks to disk, reporting `(ratio, started_at)` after every block.
//!
//! States: probing → transferring → completed | cancelled | failed.
//!
//! A transient read failure restarts the whole file from byte 0 (up to
//! `max_retries` times) unless the bytes already written equal the probed
//! size, which counts as success: some servers drop the data connection
//! right at EOF. There is no ranged resume (`REST`), so every retry pays
//! for the full file again.
//!
//! Cancellation is cooperative: the flag is polled once per block and the
//! partial file is deleted. Once the streaming loop runs there is no read
//! timeout, so a silent server can stall the worker indefinitely.

use crate::ftp::client::{FtpClient, Retrieval};
use crate::ftp::entry::TreeEntry;
use crate::ftp::error::{FtpError, FtpErrorKind, FtpResult};
use crate::ftp::types::{DownloadConfig, FtpConnectionConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

/// Progress callback: `(ratio in 0.0..=1.0, transfer start time)`.
pub type ProgressFn = Arc<dyn Fn(f64, DateTime<Utc>) + Send + Sync>;

// ─── Cancellation ────────────────────────────────────────────────────

/// Shared, polled cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe from any thread at any time.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ─── Remote byte source ──────────────────────────────────────────────

/// An open download stream.
#[async_trait]
pub trait RemoteStream: Send {
    /// Read up to `buf.len()` bytes; `Ok(0)` is end of file.
    async fn read_block(&mut self, buf: &mut [u8]) -> FtpResult<usize>;

    /// Confirm the transfer completed on the server side.
    async fn finish(&mut self) -> FtpResult<()>;
}

/// A remote file that can be sized and streamed.
#[async_trait]
pub trait RemoteFile: Send + Sync {
    /// Human-readable location for logs.
    fn location(&self) -> String;

    async fn size(&self) -> FtpResult<u64>;

    async fn open(&self) -> FtpResult<Box<dyn RemoteStream>>;
}

/// A file on an FTP server, reached with a fresh session per request.
#[derive(Debug, Clone)]
pub struct FtpRemoteFile {
    config: FtpConnectionConfig,
    path: String,
}

impl FtpRemoteFile {
    pub fn new(config: FtpConnectionConfig, path: impl Into<String>) -> Self {
        Self {
            config,
            path: path.into(),
        }
    }

    /// The file a listing entry points at.
    pub fn from_entry(config: FtpConnectionConfig, entry: &TreeEntry) -> FtpResult<Self> {
        Ok(Self::new(config, entry.remote_path()?))
    }
}

#[async_trait]
impl RemoteFile for FtpRemoteFile {
    fn location(&self) -> String {
        format!("ftp://{}:{}{}", self.config.host, self.config.port, self.path)
    }

    async fn size(&self) -> FtpResult<u64> {
        let mut client = FtpClient::connect(&self.config).await?;
        let size = client.size(&self.path).await;
        client.quit().await;
        size
    }

    async fn open(&self) -> FtpResult<Box<dyn RemoteStream>> {
        let client = FtpClient::connect(&self.config).await?;
        let retrieval = client.retr(&self.path).await?;
        Ok(Box::new(RetrStream(Some(retrieval))))
    }
}

struct RetrStream(Option<Retrieval>);

#[async_trait]
impl RemoteStream for RetrStream {
    async fn read_block(&mut self, buf: &mut [u8]) -> FtpResult<usize> {
        match self.0.as_mut() {
            Some(r) => r.read(buf).await,
            None => Ok(0),
        }
    }

    async fn finish(&mut self) -> FtpResult<()> {
        match self.0.take() {
            Some(r) => r.finish().await,
            None => Ok(()),
        }
    }
}

// ─── Outcome / progress ──────────────────────────────────────────────

/// How a download ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferOutcome {
    Completed { bytes: u64 },
    Cancelled,
    Failed { reason: String },
}

/// Keeps reported ratios non-decreasing across full restarts.
struct ProgressTracker {
    total: u64,
    high_water: f64,
    started: DateTime<Utc>,
    reporter: Option<ProgressFn>,
}

impl ProgressTracker {
    fn report(&mut self, written: u64) {
        let ratio = if self.total == 0 {
            0.0
        } else {
            (written as f64 / self.total as f64).min(1.0)
        };
        if ratio < self.high_water {
            return;
        }
        self.high_water = ratio;
        if let Some(f) = &self.reporter {
            f(ratio, self.started);
        }
    }

    fn complete(&mut self) {
        self.high_water = 1.0;
        if let Some(f) = &self.reporter {
            f(1.0, self.started);
        }
    }
}

enum Attempt {
    Completed(u64),
    Cancelled,
    Interrupted { written: u64, error: FtpError },
}

// ─── FileDownload ────────────────────────────────────────────────────

/// Transfer of one remote file to one local path.
pub struct FileDownload {
    source: Arc<dyn RemoteFile>,
    destination: PathBuf,
    config: DownloadConfig,
    total: u64,
    cancel: CancelFlag,
    reporter: Option<ProgressFn>,
}

impl FileDownload {
    /// Bind a download and probe the remote size.
    pub async fn new(
        source: Arc<dyn RemoteFile>,
        destination: impl Into<PathBuf>,
        config: DownloadConfig,
    ) -> Self {
        let total = probe_size(source.as_ref(), &config).await;
        Self {
            source,
            destination: destination.into(),
            config,
            total,
            cancel: CancelFlag::new(),
            reporter: None,
        }
    }

    /// Attach the per-block progress callback.
    pub fn with_reporter(mut self, reporter: ProgressFn) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    /// Probed size in bytes; `0` when unknown.
    pub fn total_size(&self) -> u64 {
        self.total
    }

    /// Request cancellation; observed before the next block.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the transfer to completion, cancellation or failure.
    pub async fn download(&self) -> TransferOutcome {
        let mut progress = ProgressTracker {
            total: self.total,
            high_water: 0.0,
            started: Utc::now(),
            reporter: self.reporter.clone(),
        };
        let location = self.source.location();
        log::info!("Downloading {} -> {}", location, self.destination.display());

        let mut retries = 0;
        loop {
            let attempt = match self.attempt(&mut progress).await {
                Ok(a) => a,
                Err(e) => {
                    log::warn!("Download of {} failed: {}", location, e);
                    return TransferOutcome::Failed { reason: e.to_string() };
                }
            };

            match attempt {
                Attempt::Completed(bytes) => {
                    progress.complete();
                    log::info!("Downloaded {} ({} bytes)", location, bytes);
                    return TransferOutcome::Completed { bytes };
                }
                Attempt::Cancelled => {
                    match fs::remove_file(&self.destination).await {
                        Err(e) if e.kind() != std::io::ErrorKind::NotFound => log::warn!(
                            "Could not remove partial {}: {}",
                            self.destination.display(),
                            e
                        ),
                        _ => {}
                    }
                    log::info!("Download of {} cancelled", location);
                    return TransferOutcome::Cancelled;
                }
                Attempt::Interrupted { written, error } => {
                    if self.total > 0 && written == self.total {
                        progress.complete();
                        log::info!("Downloaded {} ({} bytes, stream closed at EOF)", location, written);
                        return TransferOutcome::Completed { bytes: written };
                    }
                    if error.is_transient() && retries < self.config.max_retries {
                        retries += 1;
                        log::warn!(
                            "Transfer of {} interrupted after {} bytes ({}); restarting, retry {}/{}",
                            location,
                            written,
                            error,
                            retries,
                            self.config.max_retries
                        );
                        continue;
                    }
                    log::warn!("Giving up on {}: {}", location, error);
                    return TransferOutcome::Failed {
                        reason: error.to_string(),
                    };
                }
            }
        }
    }

    /// One pass from byte 0. `Err` means a local failure not worth retrying.
    async fn attempt(&self, progress: &mut ProgressTracker) -> FtpResult<Attempt> {
        if self.cancel.is_cancelled() {
            return Ok(Attempt::Cancelled);
        }
        let mut stream = match self.source.open().await {
            Ok(s) => s,
            Err(error) => return Ok(Attempt::Interrupted { written: 0, error }),
        };

        let mut file = fs::File::create(&self.destination).await.map_err(|e| {
            FtpError::new(
                FtpErrorKind::IoError,
                format!("Cannot create {}: {}", self.destination.display(), e),
            )
        })?;

        let mut buf = vec![0u8; self.config.block_size.max(1)];
        let mut written: u64 = 0;
        loop {
            if self.cancel.is_cancelled() {
                drop(file);
                return Ok(Attempt::Cancelled);
            }
            let n = match stream.read_block(&mut buf).await {
                Ok(n) => n,
                Err(error) => {
                    file.flush().await?;
                    return Ok(Attempt::Interrupted { written, error });
                }
            };
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await?;
            written += n as u64;
            progress.report(written);
        }
        file.flush().await?;
        drop(file);

        match stream.finish().await {
            Ok(()) => Ok(Attempt::Completed(written)),
            Err(error) => Ok(Attempt::Interrupted { written, error }),
        }
    }
}

/// `SIZE` with bounded attempts; `0` when every attempt fails.
async fn probe_size(source: &dyn RemoteFile, config: &DownloadConfig) -> u64 {
    for attempt in 1..=config.probe_attempts {
        match timeout(config.probe_timeout(), source.size()).await {
            Ok(Ok(size)) => return size,
            Ok(Err(e)) => log::warn!(
                "Size probe {}/{} for {} failed: {}",
                attempt,
                config.probe_attempts,
                source.location(),
                e
            ),
            Err(_) => log::warn!(
                "Size probe {}/{} for {} timed out",
                attempt,
                config.probe_attempts,
                source.location()
            ),
        }
    }
    0
}
