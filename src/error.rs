use freshtree_ftp::ftp::{FtpError, ListingError};

/// Everything that can stop a CLI command.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Ftp(#[from] FtpError),

    #[error("listing failed: {0}")]
    Listing(#[from] ListingError),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("task engine stopped before the command finished")]
    Worker,
}
