//! Folder listing sources.
//!
//! Both variants answer "what is inside this folder?" and never cache:
//! every call goes back to the filesystem or server.
//! Failures come back as a [`ListingError`] value; [`placeholder_entries`]
//! turns one into a single pseudo-entry for tree views that want to show
//! the message inline.

use crate::ftp::client::FtpClient;
use crate::ftp::entry::{remote_path_of, TreeEntry};
use crate::ftp::error::FtpResult;
use crate::ftp::parser;
use crate::ftp::types::FtpConnectionConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::MAIN_SEPARATOR;

/// Why a folder could not be listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingError {
    pub message: String,
}

impl ListingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ListingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ListingError {}

/// Outcome of one folder listing, in source order.
pub type Listing = Result<Vec<TreeEntry>, ListingError>;

/// Render a failed listing as a single entry named after the error.
pub fn placeholder_entries(listing: Listing) -> Vec<TreeEntry> {
    match listing {
        Ok(entries) => entries,
        Err(e) => vec![TreeEntry {
            name: e.message,
            ..TreeEntry::default()
        }],
    }
}

/// A source of folder contents.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// List `folder`, or the roots of this source when `folder` is `None`.
    async fn list_folder(&self, folder: Option<&TreeEntry>) -> Listing;
}

// ─── Local filesystem ────────────────────────────────────────────────

/// Lists sub-directories of the local filesystem; used to pick a
/// download destination, so files are never listed.
#[derive(Debug, Clone, Default)]
pub struct LocalCrawler;

impl LocalCrawler {
    pub fn new() -> Self {
        Self
    }

    /// Mounted volumes: drive roots on Windows, `/` elsewhere.
    fn volumes() -> Vec<TreeEntry> {
        #[cfg(windows)]
        {
            (b'A'..=b'Z')
                .map(|letter| format!("{}:\\", letter as char))
                .filter(|root| std::path::Path::new(root).exists())
                .map(|root| TreeEntry::directory(root, ""))
                .collect()
        }
        #[cfg(not(windows))]
        {
            vec![TreeEntry::directory("/", "")]
        }
    }

    async fn subdirectories(&self, folder: &TreeEntry) -> std::io::Result<Vec<TreeEntry>> {
        let mut path = folder.uri();
        if !path.ends_with(MAIN_SEPARATOR) {
            path.push(MAIN_SEPARATOR);
        }

        let mut result = Vec::new();
        let mut dir = tokio::fs::read_dir(&path).await?;
        while let Some(child) = dir.next_entry().await? {
            // Follows symlinks, so linked folders are listed too.
            let meta = match tokio::fs::metadata(child.path()).await {
                Ok(m) if m.is_dir() => m,
                _ => continue,
            };
            let mut entry =
                TreeEntry::directory(child.file_name().to_string_lossy().into_owned(), path.clone());
            entry.last_modified = meta.modified().ok().map(DateTime::<Utc>::from);
            result.push(entry);
        }
        Ok(result)
    }
}

#[async_trait]
impl Crawler for LocalCrawler {
    async fn list_folder(&self, folder: Option<&TreeEntry>) -> Listing {
        match folder {
            None => Ok(Self::volumes()),
            Some(folder) => self.subdirectories(folder).await.map_err(|e| {
                log::debug!("Listing {} failed: {}", folder.uri(), e);
                ListingError::new(e.to_string())
            }),
        }
    }
}

// ─── Remote FTP server ───────────────────────────────────────────────

/// Lists folders of one FTP server with `LIST`.
#[derive(Debug, Clone)]
pub struct RemoteCrawler {
    config: FtpConnectionConfig,
    root_uri: String,
}

impl RemoteCrawler {
    pub fn new(config: FtpConnectionConfig) -> Self {
        let root_uri = config.root_uri();
        Self { config, root_uri }
    }

    /// Request URI listed when no folder is given.
    pub fn root_uri(&self) -> &str {
        &self.root_uri
    }

    async fn list_uri(&self, parent_uri: &str) -> FtpResult<Vec<TreeEntry>> {
        let path = remote_path_of(parent_uri)?;
        let mut client = FtpClient::connect(&self.config).await?;
        let body = match client.list(&path).await {
            Ok(body) => body,
            Err(e) => {
                client.quit().await;
                return Err(e);
            }
        };

        let mut entries = Vec::new();
        for line in parser::listing_lines(&body) {
            let mut entry = match parser::parse_list_line(line, parent_uri) {
                Ok(entry) => entry,
                Err(e) => {
                    log::debug!("Skipping listing line: {}", e);
                    continue;
                }
            };
            if entry.name == "." || entry.name == ".." {
                continue;
            }
            // Directories are never refined: many servers reject MDTM on them.
            if !entry.is_directory {
                if let Some(exact) = Self::exact_timestamp(&mut client, &entry).await {
                    entry.last_modified = Some(exact);
                }
            }
            entries.push(entry);
        }

        client.quit().await;
        log::debug!("Listed {} entries under {}", entries.len(), parent_uri);
        Ok(entries)
    }

    /// Best-effort `MDTM`; `None` keeps the timestamp from the listing.
    async fn exact_timestamp(client: &mut FtpClient, entry: &TreeEntry) -> Option<DateTime<Utc>> {
        let path = entry.remote_path().ok()?;
        match client.mdtm(&path).await {
            Ok(ts) => Some(ts),
            Err(e) => {
                log::trace!("MDTM {} unavailable: {}", path, e);
                None
            }
        }
    }
}

#[async_trait]
impl Crawler for RemoteCrawler {
    async fn list_folder(&self, folder: Option<&TreeEntry>) -> Listing {
        let parent_uri = match folder {
            Some(f) => f.request_uri(),
            None => self.root_uri.clone(),
        };
        self.list_uri(&parent_uri).await.map_err(|e| {
            log::warn!("Listing {} failed: {}", parent_uri, e);
            ListingError::new(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn folder_of(dir: &TempDir) -> TreeEntry {
        let path = dir.path().to_string_lossy().into_owned();
        TreeEntry::directory(path, "")
    }

    #[tokio::test]
    async fn local_lists_only_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("alpha")).unwrap();
        std::fs::create_dir(dir.path().join("beta")).unwrap();
        std::fs::write(dir.path().join("file.txt"), b"x").unwrap();

        let entries = LocalCrawler::new().list_folder(Some(&folder_of(&dir))).await.unwrap();
        let mut names: Vec<_> = entries.iter().map(|e| e.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["alpha", "beta"]);
        for e in &entries {
            assert!(e.is_directory);
            assert!(e.parent_directory.ends_with(MAIN_SEPARATOR));
            assert_eq!(std::path::Path::new(&e.uri()), dir.path().join(&e.name));
            assert!(e.last_modified.is_some());
        }
    }

    #[tokio::test]
    async fn local_roots_are_directories_without_parent() {
        let roots = LocalCrawler::new().list_folder(None).await.unwrap();
        assert!(!roots.is_empty());
        assert!(roots.iter().all(|r| r.is_directory && r.parent_directory.is_empty()));
    }

    #[tokio::test]
    async fn local_missing_folder_is_listing_error() {
        let dir = TempDir::new().unwrap();
        let missing = TreeEntry::directory("does-not-exist", format!("{}{}", dir.path().display(), MAIN_SEPARATOR));
        let err = LocalCrawler::new().list_folder(Some(&missing)).await.unwrap_err();
        assert!(!err.message.is_empty());
    }

    #[test]
    fn placeholder_carries_error_text() {
        let entries = placeholder_entries(Err(ListingError::new("Access is denied.")));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Access is denied.");
        assert!(!entries[0].is_directory);
        assert_eq!(entries[0].size, 0);

        let ok = vec![TreeEntry::directory("a", "/")];
        assert_eq!(placeholder_entries(Ok(ok.clone())), ok);
    }

    #[tokio::test]
    async fn unreachable_server_is_listing_error() {
        // Port 1 on localhost refuses connections.
        let config = FtpConnectionConfig {
            host: "127.0.0.1".into(),
            port: 1,
            connect_timeout_sec: 2,
            ..FtpConnectionConfig::default()
        };
        let crawler = RemoteCrawler::new(config);
        assert_eq!(crawler.root_uri(), "ftp://127.0.0.1:1/");
        let err = crawler.list_folder(None).await.unwrap_err();
        assert!(err.message.contains("127.0.0.1:1"));
    }
}
