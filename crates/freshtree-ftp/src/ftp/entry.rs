//! The `TreeEntry` model shared by both crawlers.
//!
//! An entry knows its parent only as a path string. The tree itself lives
//! in whatever consumer renders it.

use crate::ftp::error::{FtpError, FtpResult};
use chrono::{DateTime, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Everything except RFC 3986 unreserved characters is escaped.
const NAME_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// One local or remote filesystem item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreeEntry {
    pub is_directory: bool,
    /// Nine permission characters (`rwxr-xr-x`), remote Unix listings only.
    pub permission: String,
    /// Link count column, remote Unix listings only.
    pub filecode: String,
    pub owner: String,
    pub group: String,
    pub size: u64,
    pub name: String,
    /// Absolute parent path with a closing separator; empty for roots.
    pub parent_directory: String,
    /// `None` when the source gave no usable timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

impl TreeEntry {
    /// A directory entry with nothing but a name and parent.
    pub fn directory(name: impl Into<String>, parent_directory: impl Into<String>) -> Self {
        Self {
            is_directory: true,
            name: name.into(),
            parent_directory: parent_directory.into(),
            ..Self::default()
        }
    }

    /// Raw path for display and local filesystem access.
    pub fn uri(&self) -> String {
        format!("{}{}", self.parent_directory, self.name)
    }

    /// Address used for protocol requests. Directories end with `/`.
    pub fn request_uri(&self) -> String {
        let mut uri = format!("{}{}", self.parent_directory, encode_name(&self.name));
        if self.is_directory {
            uri.push('/');
        }
        uri
    }

    /// Decoded server-side path of `request_uri()`, e.g. `/pub/My Files/`.
    pub fn remote_path(&self) -> FtpResult<String> {
        remote_path_of(&self.request_uri())
    }
}

impl fmt::Display for TreeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Percent-encode a single path segment.
pub fn encode_name(name: &str) -> String {
    utf8_percent_encode(name, NAME_ESCAPE).to_string()
}

/// Percent-decode a URL path.
pub fn decode_path(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// Extract the decoded path component of an `ftp://` request URI.
pub fn remote_path_of(request_uri: &str) -> FtpResult<String> {
    let url = Url::parse(request_uri)
        .map_err(|e| FtpError::invalid_config(format!("Invalid request URI '{}': {}", request_uri, e)))?;
    Ok(decode_path(url.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> TreeEntry {
        TreeEntry {
            name: name.into(),
            parent_directory: "ftp://host:21/pub/".into(),
            ..TreeEntry::default()
        }
    }

    #[test]
    fn request_uri_of_directory_ends_with_slash() {
        let dir = TreeEntry::directory("backups", "ftp://host:21/");
        assert_eq!(dir.request_uri(), "ftp://host:21/backups/");
        assert_eq!(dir.uri(), "ftp://host:21/backups");
    }

    #[test]
    fn request_uri_of_file_never_ends_with_slash() {
        for name in ["report.txt", "a b", "x/", "100%"] {
            assert!(!file(name).request_uri().ends_with('/'), "{}", name);
        }
    }

    #[test]
    fn names_are_escaped_only_in_request_uri() {
        let e = file("my report #1.txt");
        assert_eq!(e.uri(), "ftp://host:21/pub/my report #1.txt");
        assert_eq!(e.request_uri(), "ftp://host:21/pub/my%20report%20%231.txt");
        assert_eq!(e.remote_path().unwrap(), "/pub/my report #1.txt");
    }

    #[test]
    fn unreserved_characters_pass_through() {
        assert_eq!(encode_name("a-b_c.d~e"), "a-b_c.d~e");
        assert_eq!(encode_name("ä"), "%C3%A4");
    }

    #[test]
    fn display_is_name() {
        assert_eq!(file("x.bin").to_string(), "x.bin");
    }
}
