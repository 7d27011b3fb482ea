//! Local filesystem source implementation

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::traits::StreamSource;
use crate::error::SourceError;

/// A file on the local filesystem (or a fuse-mounted bucket).
pub struct LocalSource {
    path: PathBuf,
    file_size: u64,
}

impl LocalSource {
    /// Open a local file for reading.
    ///
    /// # Errors
    /// Returns `SourceError::NotFound` if the file doesn't exist,
    /// `SourceError::PermissionDenied` if access is denied and
    /// `SourceError::FileSystemError` for other failures.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| map_io_error(&path, e))?;

        if metadata.is_dir() {
            return Err(SourceError::FileSystemError(format!(
                "{} is a directory",
                path.display()
            )));
        }

        Ok(Self {
            file_size: metadata.len(),
            path,
        })
    }

    /// Get the path to the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Translate an I/O error into the matching `SourceError` variant.
pub(crate) fn map_io_error(path: &Path, e: std::io::Error) -> SourceError {
    match e.kind() {
        std::io::ErrorKind::NotFound => SourceError::NotFound(path.display().to_string()),
        std::io::ErrorKind::PermissionDenied => {
            SourceError::PermissionDenied(path.display().to_string())
        }
        _ => SourceError::FileSystemError(format!("{}: {}", path.display(), e)),
    }
}

#[async_trait]
impl StreamSource for LocalSource {
    async fn read_all(&self) -> Result<Bytes, SourceError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| map_io_error(&self.path, e))?;
        debug!(path = %self.path.display(), bytes = data.len(), "Read local file");
        Ok(Bytes::from(data))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

impl std::fmt::Debug for LocalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSource")
            .field("path", &self.path)
            .field("file_size", &self.file_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_read_all_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Bucket,Key\n").unwrap();

        let source = LocalSource::open(file.path()).await.unwrap();
        assert_eq!(source.path(), file.path());
        assert_eq!(&source.read_all().await.unwrap()[..], b"Bucket,Key\n");
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let result = LocalSource::open("does/not/exist.geojson").await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_open_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocalSource::open(dir.path()).await;
        assert!(matches!(result, Err(SourceError::FileSystemError(_))));
    }
}
