//! # freshtree-ftp: FTP Tree Puller Core
//!
//! Browse a remote FTP server and the local filesystem side by side and
//! pull every file that changed since a cutoff time:
//!   • Unix (`ls -l`) and Windows/IIS `LIST` line parsing
//!   • Local and remote crawlers behind one `Crawler` capability
//!   • Single-file downloads with size probe, full-restart retry,
//!     cooperative cancellation and progress callbacks
//!   • Recursive "download all after" sync with skip-if-unchanged
//!   • Single-consumer task engine serialising browse/download jobs

pub mod ftp;
