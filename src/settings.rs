//! Connection settings: an optional JSON file, overridden by flags.

use crate::cli::Cli;
use crate::error::AppError;
use freshtree_ftp::ftp::{DataChannelMode, DownloadConfig, FtpConnectionConfig, FtpCredentials};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of a `--config` file.
///
/// ```json
/// { "server": "ftp.example.com/pub", "username": "alice", "password": "secret",
///   "dataChannelMode": "extendedPassive", "download": { "maxRetries": 5 } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub data_channel_mode: DataChannelMode,
    pub connect_timeout_sec: Option<u64>,
    pub data_timeout_sec: Option<u64>,
    pub download: DownloadConfig,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// File settings (if any) with command-line flags applied on top.
    pub fn resolve(cli: &Cli) -> Result<Self, AppError> {
        let mut settings = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(server) = &cli.server {
            settings.server = server.clone();
        }
        if let Some(user) = &cli.user {
            settings.username = Some(user.clone());
        }
        if let Some(password) = &cli.password {
            settings.password = Some(password.clone());
        }
        if cli.epsv {
            settings.data_channel_mode = DataChannelMode::ExtendedPassive;
        }
        Ok(settings)
    }

    pub fn connection(&self) -> Result<FtpConnectionConfig, AppError> {
        if self.server.trim().is_empty() {
            return Err(AppError::Config(
                "no server given; pass --server or a settings file with \"server\"".into(),
            ));
        }
        let credentials = match &self.username {
            Some(user) => FtpCredentials::new(user.clone(), self.password.clone().unwrap_or_default()),
            None => FtpCredentials::default(),
        };
        let mut config = FtpConnectionConfig::from_uri(&self.server, credentials)?;
        config.data_channel_mode = self.data_channel_mode;
        if let Some(secs) = self.connect_timeout_sec {
            config.connect_timeout_sec = secs;
        }
        if let Some(secs) = self.data_timeout_sec {
            config.data_timeout_sec = secs;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn file_values_are_overridden_by_flags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server":"ftp.example.com/pub","username":"alice","password":"pw","download":{"maxRetries":5}}"#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "freshtree",
            "--config",
            path.to_str().unwrap(),
            "--user",
            "bob",
            "--epsv",
            "list",
        ]);
        let settings = Settings::resolve(&cli).unwrap();
        assert_eq!(settings.server, "ftp.example.com/pub");
        assert_eq!(settings.username.as_deref(), Some("bob"));
        assert_eq!(settings.download.max_retries, 5);
        assert_eq!(settings.download.block_size, 10_240);

        let config = settings.connection().unwrap();
        assert_eq!(config.host, "ftp.example.com");
        assert_eq!(config.root_path, "/pub/");
        assert_eq!(config.credentials, FtpCredentials::new("bob", "pw"));
        assert_eq!(config.data_channel_mode, DataChannelMode::ExtendedPassive);
    }

    #[test]
    fn anonymous_login_without_user() {
        let settings = Settings {
            server: "ftp://mirror.local:2121".into(),
            ..Settings::default()
        };
        let config = settings.connection().unwrap();
        assert_eq!(config.port, 2121);
        assert_eq!(config.credentials, FtpCredentials::default());
    }

    #[test]
    fn missing_server_is_config_error() {
        assert!(matches!(Settings::default().connection(), Err(AppError::Config(_))));
    }
}
