//! `LIST` response parser.
//!
//! Supports two formats, tried in this order:
//! 1. **Unix-style** (`ls -l`): `-rwxr-xr-x 1 owner group 1234 Jan  1 12:00 file.txt`
//! 2. **Windows/IIS-style**: `01-01-26  12:00AM       1234 file.txt`
//!
//! A line matching neither is an error; callers drop it and keep going.
//! Everything here is pure: the "current time" needed to place year-less
//! Unix dates is passed in.

use crate::ftp::entry::TreeEntry;
use crate::ftp::error::{FtpError, FtpResult};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UNIX_LINE: Regex = Regex::new(
        r"(?x)
        ^([dlcbps-])([rwxsStT-]{9})\S*\s+   # type + permissions (+ ACL marker)
        (\d+)\s+                            # link count
        (\S+)\s+                            # owner
        (\S+)\s+                            # group
        (\d+)\s+                            # size
        ([A-Za-z]{3}\s+\d{1,2}\s+(?:\d{1,2}:\d{2}|\d{4}))\s+  # date
        (.+)$                               # filename (possibly with -> target)
        "
    )
    .expect("valid Unix listing regex");
    static ref WINDOWS_LINE: Regex = Regex::new(
        r"(?xi)
        ^(\d{2}-\d{2}-\d{2})\s+             # date
        (\d{1,2}:\d{2}\s*(?:AM|PM)?)\s+     # time
        (<DIR>|\d+)\s+                      # size or <DIR>
        (.+)$                               # filename
        "
    )
    .expect("valid Windows listing regex");
}

/// Split a raw `LIST` body into candidate lines.
///
/// Handles both `\r\n` and `\n`; empty lines (including the trailing one)
/// are discarded.
pub fn listing_lines(body: &str) -> impl Iterator<Item = &str> {
    body.split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
}

/// Parse one listing line into an entry under `parent_directory`.
pub fn parse_list_line(line: &str, parent_directory: &str) -> FtpResult<TreeEntry> {
    parse_list_line_at(line, parent_directory, Utc::now())
}

/// Like [`parse_list_line`], with an explicit reference time.
pub fn parse_list_line_at(
    line: &str,
    parent_directory: &str,
    now: DateTime<Utc>,
) -> FtpResult<TreeEntry> {
    parse_unix(line, parent_directory, now)
        .or_else(|| parse_windows(line, parent_directory))
        .ok_or_else(|| FtpError::unrecognized_line(line))
}

// ─── Unix-style parser ───────────────────────────────────────────────

/// Parse a Unix `ls -l` line:
/// ```text
/// drwxr-xr-x   2 user group  4096 Jan  1 12:00 dirname
/// -rw-r--r--   1 user group  1234 Jan  1  2025 file.txt
/// lrwxrwxrwx   1 user group    42 Jan  1 12:00 link -> target
/// ```
fn parse_unix(line: &str, parent_directory: &str, now: DateTime<Utc>) -> Option<TreeEntry> {
    let caps = UNIX_LINE.captures(line)?;

    let kind = caps.get(1)?.as_str();
    let size = caps.get(6)?.as_str().parse::<u64>().ok()?;
    let name_raw = caps.get(8)?.as_str();

    let name = if kind == "l" {
        name_raw.split(" -> ").next().unwrap_or(name_raw)
    } else {
        name_raw
    };

    Some(TreeEntry {
        is_directory: kind == "d",
        permission: caps.get(2)?.as_str().to_string(),
        filecode: caps.get(3)?.as_str().to_string(),
        owner: caps.get(4)?.as_str().to_string(),
        group: caps.get(5)?.as_str().to_string(),
        size,
        name: name.to_string(),
        parent_directory: parent_directory.to_string(),
        last_modified: parse_unix_date(caps.get(7)?.as_str(), now),
    })
}

/// Parse the date portion: "Jan  1 12:00" or "Jan  1  2025".
///
/// The year-less form covers the last six months, so a result more than a
/// day ahead of `now` belongs to the previous year.
pub fn parse_unix_date(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let normalised = s.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalised.contains(':') {
        let this_year = now.year();
        for year in [this_year, this_year - 1] {
            let candidate = NaiveDateTime::parse_from_str(
                &format!("{} {}", year, normalised),
                "%Y %b %d %H:%M",
            )
            .ok()
            .map(|dt| Utc.from_utc_datetime(&dt));
            match candidate {
                Some(dt) if dt <= now + Duration::days(1) => return Some(dt),
                // Feb 29 in a non-leap year, or a date still in the future.
                _ => continue,
            }
        }
        return None;
    }

    let date = NaiveDate::parse_from_str(&normalised, "%b %d %Y").ok()?;
    let midnight = NaiveTime::from_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&date.and_time(midnight)))
}

// ─── Windows-style parser ────────────────────────────────────────────

/// Parse Windows / IIS style line:
/// ```text
/// 01-01-26  12:00AM       1234 file.txt
/// 01-01-26  12:00PM      <DIR> Directory Name
/// ```
fn parse_windows(line: &str, parent_directory: &str) -> Option<TreeEntry> {
    let caps = WINDOWS_LINE.captures(line)?;

    let size_or_dir = caps.get(3)?.as_str();
    let is_directory = size_or_dir.eq_ignore_ascii_case("<DIR>");
    let size = if is_directory {
        0
    } else {
        size_or_dir.parse::<u64>().ok()?
    };

    Some(TreeEntry {
        is_directory,
        size,
        name: caps.get(4)?.as_str().to_string(),
        parent_directory: parent_directory.to_string(),
        last_modified: parse_windows_date(caps.get(1)?.as_str(), caps.get(2)?.as_str()),
        ..TreeEntry::default()
    })
}

fn parse_windows_date(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let time: String = time.split_whitespace().collect();
    let combined = format!("{} {}", date, time);
    NaiveDateTime::parse_from_str(&combined, "%m-%d-%y %I:%M%p")
        .or_else(|_| NaiveDateTime::parse_from_str(&combined, "%m-%d-%y %H:%M"))
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

// ─── MDTM ────────────────────────────────────────────────────────────

/// Parse an MDTM timestamp: `YYYYMMDDHHmmSS[.fraction]`, always UTC.
pub fn parse_mdtm_time(s: &str) -> Option<DateTime<Utc>> {
    let base = s.get(..14)?;
    NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARENT: &str = "ftp://host:21/pub/";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
    }

    fn parse(line: &str) -> FtpResult<TreeEntry> {
        parse_list_line_at(line, PARENT, now())
    }

    #[test]
    fn unix_file() {
        let e = parse("-rw-r--r-- 1 owner group 1024 Jan 05 12:30 report.txt").unwrap();
        assert_eq!(e.name, "report.txt");
        assert_eq!(e.size, 1024);
        assert!(!e.is_directory);
        assert_eq!(e.permission, "rw-r--r--");
        assert_eq!(e.filecode, "1");
        assert_eq!(e.owner, "owner");
        assert_eq!(e.group, "group");
        assert_eq!(e.parent_directory, PARENT);
        assert_eq!(
            e.last_modified,
            Some(Utc.with_ymd_and_hms(2024, 1, 5, 12, 30, 0).unwrap())
        );
    }

    #[test]
    fn unix_dir_with_old_date_defaults_to_midnight() {
        let e = parse("drwxr-xr-x   2 root root  4096 Mar  1  2019 archive").unwrap();
        assert!(e.is_directory);
        assert_eq!(e.name, "archive");
        assert_eq!(
            e.last_modified,
            Some(Utc.with_ymd_and_hms(2019, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn unix_name_keeps_inner_spaces() {
        let e = parse("-rw-r--r--   1 ftp ftp  77 Feb 10 09:05 quarterly results v2.pdf").unwrap();
        assert_eq!(e.name, "quarterly results v2.pdf");
        assert_eq!(e.size, 77);
    }

    #[test]
    fn unix_directory_flag_follows_type_char() {
        for (line, dir) in [
            ("drwx------ 3 a b 0 Jan 1 00:00 d", true),
            ("-rwx------ 1 a b 9 Jan 1 00:00 f", false),
            ("lrwxrwxrwx 1 a b 4 Jan 1 00:00 l -> /etc", false),
            ("crw-rw-rw- 1 a b 0 Jan 1 00:00 c", false),
        ] {
            assert_eq!(parse(line).unwrap().is_directory, dir, "{}", line);
        }
    }

    #[test]
    fn unix_symlink_target_is_stripped() {
        let e = parse("lrwxrwxrwx   1 root root    22 Jan  5 08:00 link -> /var/target").unwrap();
        assert_eq!(e.name, "link");
    }

    #[test]
    fn yearless_future_date_rolls_back_a_year() {
        let e = parse("-rw-r--r-- 1 o g 5 Dec 24 18:00 gift.txt").unwrap();
        assert_eq!(
            e.last_modified,
            Some(Utc.with_ymd_and_hms(2023, 12, 24, 18, 0, 0).unwrap())
        );
    }

    #[test]
    fn windows_dir() {
        let e = parse("01-02-23  03:04PM <DIR> backups").unwrap();
        assert!(e.is_directory);
        assert_eq!(e.name, "backups");
        assert_eq!(e.size, 0);
        assert!(e.owner.is_empty() && e.permission.is_empty());
        assert_eq!(
            e.last_modified,
            Some(Utc.with_ymd_and_hms(2023, 1, 2, 15, 4, 0).unwrap())
        );
    }

    #[test]
    fn windows_file() {
        let e = parse("11-30-21  09:15AM       123456 My Documents.zip").unwrap();
        assert!(!e.is_directory);
        assert_eq!(e.size, 123_456);
        assert_eq!(e.name, "My Documents.zip");
        assert_eq!(
            e.last_modified,
            Some(Utc.with_ymd_and_hms(2021, 11, 30, 9, 15, 0).unwrap())
        );
    }

    #[test]
    fn unclassifiable_line_fails() {
        let err = parse("total 48").unwrap_err();
        assert_eq!(err.kind, crate::ftp::FtpErrorKind::ProtocolError);
        assert!(parse("").is_err());
        assert!(parse("-rw-r--r-- 1 owner group 1,024 Jan 05 12:30 x").is_err());
    }

    #[test]
    fn listing_lines_drop_empty_and_carriage_returns() {
        let body = "a\r\n\r\nb\n\n";
        assert_eq!(listing_lines(body).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn mdtm_with_and_without_fraction() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_mdtm_time("20260101120000"), Some(expected));
        assert_eq!(parse_mdtm_time("20260101120000.123"), Some(expected));
        assert_eq!(parse_mdtm_time("2026"), None);
    }
}
