//! FTP-specific error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised FTP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    pub message: String,
    /// FTP response code that triggered the error, if any.
    pub code: Option<u16>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FtpErrorKind {
    /// TCP / DNS resolution failure.
    ConnectionFailed,
    /// Wrong username/password.
    AuthFailed,
    /// Server returned a 4xx/5xx for a command.
    CommandRejected,
    /// Data channel could not be established (PASV/EPSV failed).
    DataChannelFailed,
    /// Transfer aborted or incomplete.
    TransferFailed,
    /// Server sent an un-parseable response, or a listing line could not
    /// be classified.
    ProtocolError,
    /// An I/O error on either side (socket or local file).
    IoError,
    /// Operation timed out.
    Timeout,
    /// Server closed the control connection.
    Disconnected,
    /// Permission denied on the server.
    PermissionDenied,
    /// File/directory not found on the server.
    NotFound,
    /// Disk quota exceeded.
    QuotaExceeded,
    /// Operation cancelled by user.
    Cancelled,
    /// Config / parameter validation error.
    InvalidConfig,
    /// Catch-all.
    Unknown,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ConnectionFailed, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::AuthFailed, msg)
    }

    pub fn data_channel(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::DataChannelFailed, msg)
    }

    pub fn transfer_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::TransferFailed, msg)
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ProtocolError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::IoError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Timeout, msg)
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Disconnected, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Cancelled, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidConfig, msg)
    }

    /// A listing line matched neither the Unix nor the Windows grammar.
    pub fn unrecognized_line(line: &str) -> Self {
        Self::protocol_error(format!("Could not classify listing line: '{}'", line))
    }

    /// Classify an FTP reply code into the most appropriate error kind.
    pub fn from_reply(code: u16, text: &str) -> Self {
        let kind = match code {
            421 => FtpErrorKind::Disconnected,
            425 | 426 => FtpErrorKind::DataChannelFailed,
            430 | 530 => FtpErrorKind::AuthFailed,
            450 | 550 => {
                let lower = text.to_lowercase();
                if lower.contains("permission") || lower.contains("denied") {
                    FtpErrorKind::PermissionDenied
                } else if lower.contains("not found") || lower.contains("no such") {
                    FtpErrorKind::NotFound
                } else if lower.contains("quota") {
                    FtpErrorKind::QuotaExceeded
                } else {
                    FtpErrorKind::CommandRejected
                }
            }
            451 | 452 | 552 => FtpErrorKind::TransferFailed,
            500..=504 => FtpErrorKind::CommandRejected,
            _ if code >= 400 => FtpErrorKind::CommandRejected,
            _ => FtpErrorKind::Unknown,
        };
        Self {
            kind,
            message: text.to_string(),
            code: Some(code),
        }
    }

    /// Whether a transfer hitting this error may be restarted.
    ///
    /// Network-level trouble is transient; a server that answers with a
    /// definite refusal (missing file, bad login, no permission) is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            FtpErrorKind::ConnectionFailed
                | FtpErrorKind::DataChannelFailed
                | FtpErrorKind::TransferFailed
                | FtpErrorKind::ProtocolError
                | FtpErrorKind::IoError
                | FtpErrorKind::Timeout
                | FtpErrorKind::Disconnected
        )
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message)
        } else {
            write!(f, "[FTP {:?}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => Self::timeout(format!("I/O timeout: {}", e)),
            std::io::ErrorKind::PermissionDenied => {
                Self::new(FtpErrorKind::PermissionDenied, e.to_string())
            }
            std::io::ErrorKind::NotFound => Self::new(FtpErrorKind::NotFound, e.to_string()),
            _ => Self::io_error(e.to_string()),
        }
    }
}

impl From<FtpError> for String {
    fn from(e: FtpError) -> String {
        e.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_codes_map_to_kinds() {
        assert_eq!(FtpError::from_reply(530, "Login incorrect").kind, FtpErrorKind::AuthFailed);
        assert_eq!(
            FtpError::from_reply(550, "No such file or directory").kind,
            FtpErrorKind::NotFound
        );
        assert_eq!(
            FtpError::from_reply(550, "Permission denied").kind,
            FtpErrorKind::PermissionDenied
        );
        assert_eq!(FtpError::from_reply(426, "Connection closed").kind, FtpErrorKind::DataChannelFailed);
        assert_eq!(FtpError::from_reply(421, "Timeout").kind, FtpErrorKind::Disconnected);
    }

    #[test]
    fn refusals_are_not_transient() {
        assert!(!FtpError::from_reply(550, "No such file").is_transient());
        assert!(!FtpError::from_reply(530, "Login incorrect").is_transient());
        assert!(FtpError::from_reply(426, "Transfer aborted").is_transient());
        assert!(FtpError::io_error("connection reset").is_transient());
        assert!(!FtpError::cancelled("user").is_transient());
    }

    #[test]
    fn display_includes_code() {
        let e = FtpError::from_reply(550, "nope");
        assert_eq!(e.to_string(), "[FTP CommandRejected 550] nope");
        let e = FtpError::timeout("slow");
        assert_eq!(e.to_string(), "[FTP Timeout] slow");
    }
}
