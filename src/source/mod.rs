//! Byte sources for fetching whole files from local disk, S3 or HTTP.
//!
//! The public API of this crate is synchronous; async sources are driven
//! on a private current-thread runtime through [`block_on`].

mod glob;
mod http;
mod local;
mod s3;
mod traits;

use std::future::Future;

pub use self::glob::{expand_local_glob, expand_path, expand_s3_glob, is_glob_pattern, parse_s3_glob_uri};
pub use http::HttpSource;
pub use local::LocalSource;
pub(crate) use local::map_io_error;
pub use s3::{S3Config, S3Source, DEFAULT_MAX_RETRIES};
pub use traits::{BoxedSource, StreamSource};

use crate::error::{ReaderError, SourceError};

/// Check if a path is an S3 URI.
pub fn is_s3_uri(path: &str) -> bool {
    path.starts_with("s3://")
}

/// Check if a path is an HTTP(S) URL.
pub fn is_http_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Open the source matching the shape of `uri`.
pub async fn open_source(
    uri: &str,
    s3_config: Option<&S3Config>,
) -> Result<BoxedSource, SourceError> {
    if is_s3_uri(uri) {
        Ok(Box::new(S3Source::open(uri, s3_config.cloned()).await?))
    } else if is_http_url(uri) {
        Ok(Box::new(HttpSource::new(uri)?))
    } else {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        Ok(Box::new(LocalSource::open(path).await?))
    }
}

/// Fetch the complete contents of `uri`.
pub async fn fetch(uri: &str, s3_config: Option<&S3Config>) -> Result<bytes::Bytes, SourceError> {
    open_source(uri, s3_config).await?.read_all().await
}

/// Run a future to completion on a fresh current-thread runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output, ReaderError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ReaderError::Configuration(format!("Failed to create runtime: {}", e)))?;
    Ok(runtime.block_on(future))
}
