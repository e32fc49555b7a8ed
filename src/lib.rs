//! Command-line front end for the FTP tree puller.

mod cli;
mod error;
mod settings;

pub use cli::{parse_cutoff, Cli, Command};
pub use error::AppError;
pub use settings::Settings;

use chrono::{DateTime, Utc};
use freshtree_ftp::ftp::{
    placeholder_entries, Crawler, FileResult, FtpConnectionConfig, FtpFetcher, LocalCrawler, RemoteCrawler,
    StatusSink, SyncControl, SyncJob, TaskEngine, ThrottledStatus, TransferOutcome, TreeEntry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Renders status messages as log lines.
pub struct ConsoleStatus;

impl StatusSink for ConsoleStatus {
    fn status(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn progress_bar(&self, ratio: f64) {
        tracing::debug!(ratio, "progress");
    }
}

/// Install the fmt subscriber; `RUST_LOG` wins over `level`.
///
/// The `tracing-log` bridge is installed too, so records from the core
/// crate's `log` calls show up alongside.
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("Logging already initialised: {}", e);
    }
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    let engine = TaskEngine::start();
    let result = match cli.command.clone() {
        Command::List { local, path } => list(&cli, local, path, &engine).await,
        Command::Get { remote_path, to } => get(&cli, &remote_path, to, &engine).await,
        Command::Sync { after, to } => sync(&cli, after, to, &engine).await,
    };
    engine.shutdown().await;
    result
}

// ─── Commands ────────────────────────────────────────────────────────

async fn list(cli: &Cli, local: bool, path: Option<String>, engine: &TaskEngine) -> Result<(), AppError> {
    let (crawler, folder): (Arc<dyn Crawler>, Option<TreeEntry>) = if local {
        (Arc::new(LocalCrawler::new()), path.map(|p| TreeEntry::directory(p, "")))
    } else {
        let mut config = Settings::resolve(cli)?.connection()?;
        if let Some(p) = path {
            config.root_path = resolve_remote_dir(&config, &p);
        }
        (Arc::new(RemoteCrawler::new(config)), None)
    };

    let listing = engine
        .run(async move { crawler.list_folder(folder.as_ref()).await })
        .await
        .map_err(|_| AppError::Worker)?;
    for entry in placeholder_entries(listing) {
        println!("{}", format_entry(&entry));
    }
    Ok(())
}

async fn get(cli: &Cli, remote_path: &str, to: PathBuf, engine: &TaskEngine) -> Result<(), AppError> {
    let settings = Settings::resolve(cli)?;
    let mut config = settings.connection()?;
    let (parent, name) = split_remote_path(&config, remote_path)?;
    config.root_path = parent;

    let crawler = Arc::new(RemoteCrawler::new(config.clone()));
    let status: Arc<dyn StatusSink> = Arc::new(ThrottledStatus::new(ConsoleStatus));
    let fetcher = Arc::new(FtpFetcher::new(config, settings.download.clone(), status.clone()));
    let job = Arc::new(SyncJob::new(crawler.clone(), fetcher, status));
    let interrupt = cancel_on_ctrl_c(job.control());

    let display = remote_path.to_string();
    let result = engine
        .run(async move {
            // The listing supplies the size used by the unchanged check.
            let entry = crawler
                .list_folder(None)
                .await?
                .into_iter()
                .find(|e| e.name == name && !e.is_directory)
                .ok_or_else(|| AppError::Argument(format!("'{}' is not a file on the server", display)))?;
            Ok::<_, AppError>(job.download_one(&entry, &to).await)
        })
        .await;
    interrupt.abort();

    match result.map_err(|_| AppError::Worker)?? {
        FileResult::Unchanged => tracing::info!("{} is already up to date", remote_path),
        FileResult::Transferred(TransferOutcome::Completed { bytes }) => {
            tracing::info!(bytes, "Downloaded {}", remote_path)
        }
        FileResult::Transferred(TransferOutcome::Cancelled) => tracing::warn!("Download of {} cancelled", remote_path),
        FileResult::Transferred(TransferOutcome::Failed { reason }) => return Err(AppError::Transfer(reason)),
    }
    Ok(())
}

async fn sync(cli: &Cli, after: DateTime<Utc>, to: PathBuf, engine: &TaskEngine) -> Result<(), AppError> {
    let settings = Settings::resolve(cli)?;
    let config = settings.connection()?;

    let status: Arc<dyn StatusSink> = Arc::new(ThrottledStatus::new(ConsoleStatus));
    let crawler = Arc::new(RemoteCrawler::new(config.clone()));
    let fetcher = Arc::new(FtpFetcher::new(config, settings.download.clone(), status.clone()));
    let job = Arc::new(SyncJob::new(crawler, fetcher, status));
    let interrupt = cancel_on_ctrl_c(job.control());

    let report = engine
        .run(async move { job.download_all_after(after, &to).await })
        .await;
    interrupt.abort();
    let report = report.map_err(|_| AppError::Worker)?;

    for err in &report.listing_errors {
        tracing::warn!("Not listed: {}", err);
    }
    tracing::info!(
        downloaded = report.downloaded,
        unchanged = report.skipped_unchanged,
        older = report.skipped_old,
        failed = report.failed,
        cancelled = report.cancelled,
        "Sync summary"
    );
    if report.failed > 0 {
        return Err(AppError::Transfer(format!("{} file(s) could not be downloaded", report.failed)));
    }
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// First Ctrl-C cancels the whole run; the task is aborted when done.
fn cancel_on_ctrl_c(control: SyncControl) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            control.cancel_all();
        }
    })
}

/// Absolute paths are taken as-is, relative ones hang off the configured root.
fn resolve_remote_dir(config: &FtpConnectionConfig, path: &str) -> String {
    let mut dir = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}{}", config.root_path, path)
    };
    if !dir.ends_with('/') {
        dir.push('/');
    }
    dir
}

/// Split a remote file path into its folder (with trailing `/`) and name.
fn split_remote_path(config: &FtpConnectionConfig, path: &str) -> Result<(String, String), AppError> {
    let path = path.trim();
    let (parent, name) = match path.rfind('/') {
        Some(i) => (&path[..=i], &path[i + 1..]),
        None => ("", path),
    };
    if name.is_empty() {
        return Err(AppError::Argument(format!("'{}' names a folder, not a file", path)));
    }
    Ok((resolve_remote_dir(config, parent), name.to_string()))
}

fn format_entry(entry: &TreeEntry) -> String {
    let kind = if entry.is_directory { 'd' } else { '-' };
    let when = entry
        .last_modified
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let size = if entry.is_directory {
        String::new()
    } else {
        entry.size.to_string()
    };
    format!("{} {:>16} {:>12} {}", kind, when, size, entry.name)
}
