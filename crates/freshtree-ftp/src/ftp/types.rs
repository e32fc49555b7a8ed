//! Shared types for the FTP crate.

use crate::ftp::error::{FtpError, FtpResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

// ─── Connection ──────────────────────────────────────────────────────

/// Passive data-channel variant requested from the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DataChannelMode {
    /// `PASV`: server returns `h1,h2,h3,h4,p1,p2`.
    Passive,
    /// `EPSV`: server returns a port on the control host.
    ExtendedPassive,
}

impl Default for DataChannelMode {
    fn default() -> Self {
        Self::Passive
    }
}

/// Plain username/password login data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FtpCredentials {
    pub username: String,
    pub password: String,
}

impl FtpCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for FtpCredentials {
    fn default() -> Self {
        Self::new("anonymous", "anonymous@")
    }
}

/// Configuration for reaching one FTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub credentials: FtpCredentials,
    #[serde(default)]
    pub data_channel_mode: DataChannelMode,
    /// Remote directory crawled when no folder is given; always ends in `/`.
    #[serde(default = "default_root")]
    pub root_path: String,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    /// Data-channel connect timeout in seconds.
    #[serde(default = "default_data_timeout")]
    pub data_timeout_sec: u64,
}

fn default_port() -> u16 {
    21
}
fn default_root() -> String {
    "/".into()
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_data_timeout() -> u64 {
    30
}

impl Default for FtpConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            credentials: FtpCredentials::default(),
            data_channel_mode: DataChannelMode::Passive,
            root_path: default_root(),
            connect_timeout_sec: default_connect_timeout(),
            data_timeout_sec: default_data_timeout(),
        }
    }
}

impl FtpConnectionConfig {
    /// Build a config from a user-typed server address.
    ///
    /// Accepts `host`, `host/some/path` and `ftp://host:port/some/path`.
    pub fn from_uri(uri: &str, credentials: FtpCredentials) -> FtpResult<Self> {
        let base = base_uri(uri)?;
        let host = base
            .host_str()
            .ok_or_else(|| FtpError::invalid_config(format!("No host in '{}'", uri)))?
            .to_string();
        let root_path = crate::ftp::entry::decode_path(base.path());
        Ok(Self {
            host,
            port: base.port_or_known_default().unwrap_or(default_port()),
            credentials,
            root_path,
            ..Self::default()
        })
    }

    /// Request URI of the configured root, e.g. `ftp://host:21/pub/`.
    pub fn root_uri(&self) -> String {
        let encoded: Vec<String> = self
            .root_path
            .split('/')
            .map(crate::ftp::entry::encode_name)
            .collect();
        let mut path = encoded.join("/");
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        if !path.ends_with('/') {
            path.push('/');
        }
        format!("ftp://{}:{}{}", self.host, self.port, path)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_sec)
    }
}

/// Parse a server address into a URL whose path ends with `/`.
fn base_uri(uri: &str) -> FtpResult<Url> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return Err(FtpError::invalid_config("Server address must not be empty"));
    }
    let mut full = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("ftp://{}", trimmed)
    };
    if !full.ends_with('/') {
        full.push('/');
    }
    let url = Url::parse(&full)
        .map_err(|e| FtpError::invalid_config(format!("Invalid server address '{}': {}", uri, e)))?;
    if url.scheme() != "ftp" {
        return Err(FtpError::invalid_config(format!(
            "Unsupported scheme '{}' (only ftp:// is supported)",
            url.scheme()
        )));
    }
    Ok(url)
}

// ─── Download tuning ─────────────────────────────────────────────────

/// Fixed limits of the transfer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadConfig {
    /// Bytes read from the data channel per loop iteration.
    #[serde(default = "default_block")]
    pub block_size: usize,
    /// Full-restart retries after a transient mid-transfer failure.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// `SIZE` attempts before giving up and treating the total as unknown.
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,
    /// Per-attempt `SIZE` timeout in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_sec: u64,
}

fn default_block() -> usize {
    10_240
}
fn default_retries() -> u32 {
    3
}
fn default_probe_attempts() -> u32 {
    3
}
fn default_probe_timeout() -> u64 {
    10
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            block_size: default_block(),
            max_retries: default_retries(),
            probe_attempts: default_probe_attempts(),
            probe_timeout_sec: default_probe_timeout(),
        }
    }
}

impl DownloadConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_sec)
    }
}

// ─── FTP Response ────────────────────────────────────────────────────

/// A single FTP response (may be multi-line).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpResponse {
    /// Full response text (all lines joined).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether this is a positive-preliminary reply (1xx).
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Whether this is a positive-completion reply (2xx).
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_uri_adds_scheme_and_trailing_slash() {
        let cfg = FtpConnectionConfig::from_uri("ftp.example.com/pub", FtpCredentials::default()).unwrap();
        assert_eq!(cfg.host, "ftp.example.com");
        assert_eq!(cfg.port, 21);
        assert_eq!(cfg.root_path, "/pub/");
        assert_eq!(cfg.root_uri(), "ftp://ftp.example.com:21/pub/");
    }

    #[test]
    fn from_uri_keeps_explicit_port_and_decodes_path() {
        let cfg = FtpConnectionConfig::from_uri(
            "ftp://10.0.0.5:2121/My%20Files/",
            FtpCredentials::new("bob", "secret"),
        )
        .unwrap();
        assert_eq!(cfg.host, "10.0.0.5");
        assert_eq!(cfg.port, 2121);
        assert_eq!(cfg.root_path, "/My Files/");
        assert_eq!(cfg.credentials.username, "bob");
        assert_eq!(cfg.root_uri(), "ftp://10.0.0.5:2121/My%20Files/");
    }

    #[test]
    fn from_uri_rejects_other_schemes() {
        let err = FtpConnectionConfig::from_uri("http://example.com", FtpCredentials::default()).unwrap_err();
        assert_eq!(err.kind, crate::ftp::FtpErrorKind::InvalidConfig);
        assert!(FtpConnectionConfig::from_uri("  ", FtpCredentials::default()).is_err());
    }

    #[test]
    fn config_defaults_from_json() {
        let cfg: FtpConnectionConfig = serde_json::from_str(r#"{"host":"h"}"#).unwrap();
        assert_eq!(cfg.port, 21);
        assert_eq!(cfg.root_path, "/");
        assert_eq!(cfg.data_channel_mode, DataChannelMode::Passive);
        assert_eq!(cfg.credentials.username, "anonymous");

        let dl = DownloadConfig::default();
        assert_eq!(dl.block_size, 10_240);
        assert_eq!(dl.max_retries, 3);
        assert_eq!(dl.probe_attempts, 3);
    }
}
