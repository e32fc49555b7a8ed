use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "freshtree",
    version,
    about = "Pull files changed since a cutoff date from an FTP server",
    long_about = "`freshtree` browses an FTP server and the local filesystem, and pulls every remote
file modified after a given date into a local folder, mirroring the remote layout.

EXAMPLE:
    # Everything changed since the start of June
    freshtree --server ftp.example.com/pub --user alice --password secret \\
        sync --after 2024-06-01 --to ./mirror

Files already present locally with the same size are not downloaded again."
)]
pub struct Cli {
    // Connection
    /// Server address: `host`, `host/path` or `ftp://host[:port]/path`
    #[arg(short = 's', long, global = true, help_heading = "Connection")]
    pub server: Option<String>,

    /// Login name (anonymous when omitted)
    #[arg(short = 'u', long, global = true, help_heading = "Connection")]
    pub user: Option<String>,

    /// Login password
    #[arg(short = 'p', long, global = true, help_heading = "Connection")]
    pub password: Option<String>,

    /// Use EPSV instead of PASV for data connections
    #[arg(long, global = true, help_heading = "Connection")]
    pub epsv: bool,

    /// JSON settings file; flags override its values
    #[arg(short = 'c', long, value_name = "PATH", global = true, help_heading = "Connection")]
    pub config: Option<PathBuf>,

    // Output
    /// Log filter used when RUST_LOG is not set (e.g. `info`, `debug`, `freshtree_ftp=trace`)
    #[arg(long, default_value = "info", global = true, help_heading = "Output")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true, help_heading = "Output")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the roots, or the contents of a folder
    List {
        /// Browse the local filesystem instead of the server
        #[arg(long)]
        local: bool,

        /// Folder to list; roots when omitted
        path: Option<String>,
    },

    /// Download one remote file
    Get {
        /// Absolute path of the file on the server
        remote_path: String,

        /// Local destination folder
        #[arg(long, value_name = "DIR")]
        to: PathBuf,
    },

    /// Download every file modified after a date, recursively
    Sync {
        /// Cutoff as `YYYY-MM-DD`, `YYYY-MM-DD HH:MM` or RFC 3339 (UTC)
        #[arg(long, value_name = "DATE", value_parser = parse_cutoff)]
        after: DateTime<Utc>,

        /// Local destination folder
        #[arg(long, value_name = "DIR")]
        to: PathBuf,
    },
}

/// Parse a cutoff date; values without an offset are taken as UTC.
pub fn parse_cutoff(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Ok(Utc.from_utc_datetime(&dt));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .ok_or_else(|| format!("'{}' is not a date (expected YYYY-MM-DD[ HH:MM])", s))
}
