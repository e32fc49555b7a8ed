//! FTP tree puller core.
//!
//! Architecture:
//! - `types`: connection/download configuration and reply types
//! - `error`: FTP-specific error type
//! - `protocol`: low-level command/response codec
//! - `connection`: TCP transport for the control channel
//! - `client`: per-request FTP session (login, CWD, LIST, SIZE, MDTM, RETR)
//! - `transfer`: passive data channel (PASV/EPSV)
//! - `entry`: `TreeEntry` model and its derived URIs
//! - `parser`: Unix/Windows LIST line parsing
//! - `crawler`: local and remote folder listing sources
//! - `download`: single-file transfer engine with retry and cancellation
//! - `sync`: recursive "download all after" orchestration
//! - `status`: status/progress sink and throttling
//! - `worker`: single-consumer task engine

pub mod types;
pub mod error;
pub mod protocol;
pub mod connection;
pub mod client;
pub mod transfer;
pub mod entry;
pub mod parser;
pub mod crawler;
pub mod download;
pub mod sync;
pub mod status;
pub mod worker;

pub use types::*;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use entry::TreeEntry;
pub use crawler::{placeholder_entries, Crawler, Listing, ListingError, LocalCrawler, RemoteCrawler};
pub use download::{CancelFlag, FileDownload, FtpRemoteFile, ProgressFn, RemoteFile, RemoteStream, TransferOutcome};
pub use sync::{Fetcher, FileResult, FtpFetcher, SyncControl, SyncJob, SyncReport};
pub use status::{download_status, remaining_display, LogStatus, StatusSink, ThrottledStatus};
pub use worker::TaskEngine;
