//! Typed view of a resolved path string.

use std::fmt;
use std::path::PathBuf;

use crate::source::{is_http_url, is_s3_uri};

/// Prefix marking a path as a zip archive.
pub const ZIP_PREFIX: &str = "zip://";

/// Where the decoder should read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// File on the local filesystem
    Local(PathBuf),
    /// HTTP(S) URL
    Remote(String),
    /// `s3://bucket/key`
    S3(String),
    /// Zip archive, optionally narrowed to members matching a glob
    Archive {
        archive: Box<Location>,
        member: Option<String>,
    },
}

impl Location {
    /// Parse a resolved path.
    ///
    /// Accepts plain paths, `file://` and `s3://` URIs, HTTP(S) URLs,
    /// `zip://<archive>` and `zip://<member-glob>::<archive>`. Remote URLs
    /// ending in `.zip` are archives even without the prefix, since remote
    /// paths are never prefixed by the resolver.
    pub fn parse(path: &str) -> Location {
        if let Some(rest) = path.strip_prefix(ZIP_PREFIX) {
            return match rest.split_once("::") {
                Some((member, archive)) => Location::Archive {
                    archive: Box::new(Location::parse_plain(archive)),
                    member: (!member.is_empty()).then(|| member.to_string()),
                },
                None => Location::Archive {
                    archive: Box::new(Location::parse_plain(rest)),
                    member: None,
                },
            };
        }

        let plain = Location::parse_plain(path);
        match &plain {
            Location::Remote(_) | Location::S3(_) if has_zip_extension(path) => {
                Location::Archive {
                    archive: Box::new(plain),
                    member: None,
                }
            }
            _ => plain,
        }
    }

    fn parse_plain(path: &str) -> Location {
        if is_http_url(path) {
            Location::Remote(path.to_string())
        } else if is_s3_uri(path) {
            Location::S3(path.to_string())
        } else {
            Location::Local(PathBuf::from(path.strip_prefix("file://").unwrap_or(path)))
        }
    }

    /// URI accepted by [`crate::source::open_source`].
    pub fn uri(&self) -> String {
        match self {
            Location::Local(path) => path.display().to_string(),
            Location::Remote(url) | Location::S3(url) => url.clone(),
            Location::Archive { archive, .. } => archive.uri(),
        }
    }

    /// Final path component without any query string.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Location::Archive { archive, .. } => archive.file_name(),
            other => file_name(&other.uri()).map(str::to_string),
        }
    }

    /// Lower-cased extension of the final path component.
    pub fn extension(&self) -> Option<String> {
        self.file_name().and_then(|name| extension(&name))
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, Location::Archive { .. })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Archive {
                archive,
                member: Some(member),
            } => write!(f, "{}{}::{}", ZIP_PREFIX, member, archive),
            Location::Archive { archive, member: None } => write!(f, "{}{}", ZIP_PREFIX, archive),
            other => f.write_str(&other.uri()),
        }
    }
}

/// Final component of a `/`-separated path or URL, query stripped.
pub fn file_name(path: &str) -> Option<&str> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
}

/// Lower-cased extension of a file name.
pub fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// Whether the final path component has a `.zip` extension.
pub fn has_zip_extension(path: &str) -> bool {
    file_name(path).and_then(extension).as_deref() == Some("zip")
}
