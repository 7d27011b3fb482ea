//! Cache layers consulted by the resolver.
//!
//! A [`CacheLayer`] serves cache-chained URLs (`simplecache::https://...`);
//! a [`LegacyCache`] is the older per-source cache object that materialises
//! a URL and maps it to a local path.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::location::file_name;
use super::options::{CacheKind, CacheOptions};
use crate::error::SourceError;
use crate::source::{self, S3Config};

/// Turns a remote target into a local file.
pub trait CacheLayer: Send + Sync + Debug {
    /// Local path holding `target`, downloading it if needed.
    fn open_local(
        &self,
        kind: CacheKind,
        target: &str,
        options: &CacheOptions,
        s3: Option<&S3Config>,
    ) -> Result<PathBuf, SourceError>;
}

/// Older cache interface: `load` materialises, `path` maps to the local copy.
pub trait LegacyCache: Send + Sync + Debug {
    fn load(&self, urlpath: &str) -> Result<(), SourceError>;

    fn path(&self, urlpath: &str) -> PathBuf;
}

/// Download-once cache on the local filesystem.
///
/// Files are named after the original file name when `same_names` is set,
/// otherwise after the SHA-256 of the full URL.
#[derive(Debug, Clone, Default)]
pub struct DownloadCache {
    root: Option<PathBuf>,
}

impl DownloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `root` when the cache options name no `cache_storage`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn directory(&self, options: &CacheOptions) -> PathBuf {
        options
            .cache_storage
            .clone()
            .or_else(|| self.root.clone())
            .unwrap_or_else(|| std::env::temp_dir().join("geosource-cache"))
    }

    /// Where `target` is stored under `options`.
    pub fn local_path(&self, target: &str, options: &CacheOptions) -> PathBuf {
        let dir = self.directory(options);
        match file_name(target) {
            Some(name) if options.preserves_names() => dir.join(name),
            _ => dir.join(url_hash(target)),
        }
    }

    fn download(&self, target: &str, dest: &Path, s3: Option<&S3Config>) -> Result<(), SourceError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| source::map_io_error(parent, e))?;
        }
        let bytes = source::block_on(source::fetch(target, s3))
            .map_err(|e| SourceError::FileSystemError(e.to_string()))??;
        std::fs::write(dest, &bytes)
            .map_err(|e| source::map_io_error(dest, e))?;
        info!(
            url = %target,
            path = %dest.display(),
            size_bytes = bytes.len(),
            "Cached remote file"
        );
        Ok(())
    }
}

impl CacheLayer for DownloadCache {
    fn open_local(
        &self,
        kind: CacheKind,
        target: &str,
        options: &CacheOptions,
        s3: Option<&S3Config>,
    ) -> Result<PathBuf, SourceError> {
        let path = self.local_path(target, options);
        if path.exists() {
            debug!(cache = %kind, path = %path.display(), "Cache hit");
            return Ok(path);
        }
        self.download(target, &path, s3)?;
        Ok(path)
    }
}

impl LegacyCache for DownloadCache {
    fn load(&self, urlpath: &str) -> Result<(), SourceError> {
        let path = LegacyCache::path(self, urlpath);
        if path.exists() {
            return Ok(());
        }
        self.download(urlpath, &path, None)
    }

    /// `<root>/<sha256(url)>/<file name>`
    fn path(&self, urlpath: &str) -> PathBuf {
        let dir = self.directory(&CacheOptions::default()).join(url_hash(urlpath));
        dir.join(file_name(urlpath).unwrap_or("data"))
    }
}

fn url_hash(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
