//! "Download everything newer than X" over a whole remote tree.
//!
//! The walk is depth-first in listing order, fetching children only when
//! a directory is visited. Directories are always descended; the cutoff
//! only filters files. A local file whose length equals the remote size
//! is treated as already downloaded and never transferred again.

use crate::ftp::crawler::Crawler;
use crate::ftp::download::{CancelFlag, FileDownload, FtpRemoteFile, ProgressFn, TransferOutcome};
use crate::ftp::entry::TreeEntry;
use crate::ftp::status::{download_status, StatusSink};
use crate::ftp::types::{DownloadConfig, FtpConnectionConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;

// ─── Fetcher ─────────────────────────────────────────────────────────

/// Transfers one remote file to a local path.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, entry: &TreeEntry, destination: &Path, cancel: CancelFlag) -> TransferOutcome;
}

/// [`Fetcher`] backed by [`FileDownload`] over FTP.
pub struct FtpFetcher {
    config: FtpConnectionConfig,
    download: DownloadConfig,
    status: Arc<dyn StatusSink>,
}

impl FtpFetcher {
    pub fn new(config: FtpConnectionConfig, download: DownloadConfig, status: Arc<dyn StatusSink>) -> Self {
        Self {
            config,
            download,
            status,
        }
    }
}

#[async_trait]
impl Fetcher for FtpFetcher {
    async fn fetch(&self, entry: &TreeEntry, destination: &Path, cancel: CancelFlag) -> TransferOutcome {
        let source = match FtpRemoteFile::from_entry(self.config.clone(), entry) {
            Ok(s) => Arc::new(s),
            Err(e) => return TransferOutcome::Failed { reason: e.to_string() },
        };

        let status = self.status.clone();
        let name = entry.name.clone();
        let reporter: ProgressFn = Arc::new(move |ratio, started| {
            status.status_lazy(&download_status(&name, ratio, started));
            status.progress_bar(ratio);
        });

        FileDownload::new(source, destination, self.download.clone())
            .await
            .with_reporter(reporter)
            .with_cancel_flag(cancel)
            .download()
            .await
    }
}

// ─── Cancellation ────────────────────────────────────────────────────

/// Cancellation handles for a running sync; clones share state.
#[derive(Debug, Clone, Default)]
pub struct SyncControl {
    all: CancelFlag,
    current: Arc<Mutex<Option<CancelFlag>>>,
}

impl SyncControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the file in flight; the walk carries on with the next one.
    pub fn cancel_current(&self) {
        if let Ok(current) = self.current.lock() {
            if let Some(flag) = current.as_ref() {
                flag.cancel();
            }
        }
    }

    /// Stop the walk and the file in flight.
    pub fn cancel_all(&self) {
        self.all.cancel();
        self.cancel_current();
    }

    pub fn is_cancelled(&self) -> bool {
        self.all.is_cancelled()
    }

    fn reset(&self) {
        self.all.reset();
    }

    fn begin_file(&self) -> CancelFlag {
        let flag = CancelFlag::new();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(flag.clone());
        }
        if self.all.is_cancelled() {
            flag.cancel();
        }
        flag
    }

    fn end_file(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }
}

// ─── Report ──────────────────────────────────────────────────────────

/// Result of handling one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileResult {
    /// A local file of the same length already exists.
    Unchanged,
    Transferred(TransferOutcome),
}

/// Tally of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub downloaded: usize,
    pub skipped_unchanged: usize,
    pub skipped_old: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// `"<folder>: <message>"` for every folder that could not be listed.
    pub listing_errors: Vec<String>,
    /// The walk was stopped before visiting the whole tree.
    pub interrupted: bool,
}

impl SyncReport {
    fn record(&mut self, result: &FileResult) {
        match result {
            FileResult::Unchanged => self.skipped_unchanged += 1,
            FileResult::Transferred(TransferOutcome::Completed { .. }) => self.downloaded += 1,
            FileResult::Transferred(TransferOutcome::Cancelled) => self.cancelled += 1,
            FileResult::Transferred(TransferOutcome::Failed { .. }) => self.failed += 1,
        }
    }
}

// ─── SyncJob ─────────────────────────────────────────────────────────

/// A pending visit: `entry` (`None` for the root) lives in `local_dir`.
struct Visit {
    entry: Option<TreeEntry>,
    local_dir: PathBuf,
}

/// Walks a crawler's tree and fetches new files.
pub struct SyncJob {
    crawler: Arc<dyn Crawler>,
    fetcher: Arc<dyn Fetcher>,
    status: Arc<dyn StatusSink>,
    control: SyncControl,
}

impl SyncJob {
    pub fn new(crawler: Arc<dyn Crawler>, fetcher: Arc<dyn Fetcher>, status: Arc<dyn StatusSink>) -> Self {
        Self {
            crawler,
            fetcher,
            status,
            control: SyncControl::new(),
        }
    }

    /// Handle for cancelling from another task.
    pub fn control(&self) -> SyncControl {
        self.control.clone()
    }

    /// Fetch every file modified at or after `cutoff` into `local_root`,
    /// mirroring the remote folder structure. Files without a known
    /// modification time are treated as old.
    pub async fn download_all_after(&self, cutoff: DateTime<Utc>, local_root: &Path) -> SyncReport {
        self.control.reset();
        let mut report = SyncReport::default();
        log::info!("Syncing files modified after {} into {}", cutoff, local_root.display());

        let mut pending = vec![Visit {
            entry: None,
            local_dir: local_root.to_path_buf(),
        }];
        while let Some(visit) = pending.pop() {
            if self.control.is_cancelled() {
                report.interrupted = true;
                break;
            }
            match visit.entry {
                Some(file) if !file.is_directory => {
                    self.visit_file(&file, &visit.local_dir, cutoff, &mut report).await;
                }
                folder => {
                    let children_dir = match &folder {
                        Some(dir) => match local_child(&visit.local_dir, &dir.name) {
                            Some(path) => path,
                            None => {
                                log::warn!("Not descending into {}: unsafe local name", dir.uri());
                                report
                                    .listing_errors
                                    .push(format!("{}: unsafe local name", dir.uri()));
                                continue;
                            }
                        },
                        None => visit.local_dir,
                    };
                    let children = self.expand(folder.as_ref(), &mut report).await;
                    // Reversed so the stack pops them in listing order.
                    pending.extend(children.into_iter().rev().map(|child| Visit {
                        entry: Some(child),
                        local_dir: children_dir.clone(),
                    }));
                }
            }
        }

        if self.control.is_cancelled() {
            report.interrupted = true;
            self.status.status("Process cancelled.");
        } else {
            self.status.progress_bar(1.0);
            self.status.status("Latest files downloaded.");
        }
        log::info!(
            "Sync finished: {} downloaded, {} unchanged, {} older than cutoff, {} failed, {} cancelled, {} unlistable folders",
            report.downloaded,
            report.skipped_unchanged,
            report.skipped_old,
            report.failed,
            report.cancelled,
            report.listing_errors.len()
        );
        report
    }

    /// Fetch a single file into `local_dir`, skipping it when unchanged.
    pub async fn download_one(&self, entry: &TreeEntry, local_dir: &Path) -> FileResult {
        self.control.reset();
        if let Err(e) = fs::create_dir_all(local_dir).await {
            return FileResult::Transferred(TransferOutcome::Failed {
                reason: format!("Cannot create {}: {}", local_dir.display(), e),
            });
        }
        self.fetch_file(entry, local_dir).await
    }

    async fn expand(&self, folder: Option<&TreeEntry>, report: &mut SyncReport) -> Vec<TreeEntry> {
        let label = folder.map(TreeEntry::uri).unwrap_or_else(|| "server root".to_string());
        self.status.progress_bar(0.5);
        self.status.status(&format!("Expanding {}...", label));
        match self.crawler.list_folder(folder).await {
            Ok(children) => children,
            Err(e) => {
                log::warn!("Cannot list {}: {}", label, e);
                report.listing_errors.push(format!("{}: {}", label, e));
                Vec::new()
            }
        }
    }

    async fn visit_file(&self, file: &TreeEntry, local_dir: &Path, cutoff: DateTime<Utc>, report: &mut SyncReport) {
        match file.last_modified {
            Some(ts) if ts >= cutoff => {}
            _ => {
                report.skipped_old += 1;
                return;
            }
        }
        if let Err(e) = fs::create_dir_all(local_dir).await {
            log::warn!("Cannot create {}: {}", local_dir.display(), e);
            report.failed += 1;
            return;
        }
        let result = self.fetch_file(file, local_dir).await;
        report.record(&result);
    }

    async fn fetch_file(&self, entry: &TreeEntry, local_dir: &Path) -> FileResult {
        let Some(destination) = local_child(local_dir, &entry.name) else {
            log::warn!("Refusing to download {}: unsafe local name", entry.uri());
            return FileResult::Transferred(TransferOutcome::Failed {
                reason: format!("'{}' is not a plain file name", entry.name),
            });
        };
        if is_unchanged(&destination, entry.size).await {
            log::debug!("{} is up to date", destination.display());
            return FileResult::Unchanged;
        }

        let cancel = self.control.begin_file();
        let outcome = self.fetcher.fetch(entry, &destination, cancel).await;
        self.control.end_file();

        match &outcome {
            TransferOutcome::Completed { .. } => self.status.status(&format!("Downloaded {}.", entry.name)),
            TransferOutcome::Failed { reason } => log::warn!("Download of {} failed: {}", entry.name, reason),
            TransferOutcome::Cancelled => {}
        }
        FileResult::Transferred(outcome)
    }
}

/// `dir` joined with a server-supplied `name`, or `None` unless the name
/// is a single plain path component.
fn local_child(dir: &Path, name: &str) -> Option<PathBuf> {
    if name.contains(['/', '\\']) {
        return None;
    }
    let mut parts = Path::new(name).components();
    match (parts.next(), parts.next()) {
        (Some(Component::Normal(part)), None) => Some(dir.join(part)),
        _ => None,
    }
}

/// A local file of exactly `size` bytes already exists at `path`.
async fn is_unchanged(path: &Path, size: u64) -> bool {
    matches!(fs::metadata(path).await, Ok(meta) if meta.is_file() && meta.len() == size)
}
