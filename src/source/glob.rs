//! Glob expansion for multi-file sources (GeoParquet datasets).
//!
//! Local patterns go through `glob`; S3 patterns list the bucket under the
//! longest literal prefix and match keys with `globset`.

use globset::GlobBuilder;
use tracing::{debug, warn};

use super::{is_s3_uri, S3Config, S3Source};
use crate::error::SourceError;

/// Characters that indicate a glob pattern.
const GLOB_CHARS: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Check if a path contains glob pattern characters.
///
/// ```
/// use geosource::source::is_glob_pattern;
///
/// assert!(is_glob_pattern("data/*.parquet"));
/// assert!(is_glob_pattern("data/part-[0-9].parquet"));
/// assert!(!is_glob_pattern("s3://bucket/buildings.parquet"));
/// ```
pub fn is_glob_pattern(path: &str) -> bool {
    path.chars().any(|c| GLOB_CHARS.contains(&c))
}

/// Expand a local glob pattern to a sorted list of files.
///
/// # Errors
/// `SourceError::FileSystemError` for an invalid pattern and
/// `SourceError::NotFound` when nothing matches.
pub fn expand_local_glob(pattern: &str) -> Result<Vec<String>, SourceError> {
    let entries = glob::glob(pattern).map_err(|e| {
        SourceError::FileSystemError(format!("Invalid glob pattern '{}': {}", pattern, e))
    })?;

    let mut paths: Vec<String> = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => match path.to_str() {
                Some(path) => paths.push(path.to_string()),
                None => debug!(path = ?path, "Skipping non UTF-8 path"),
            },
            // Unreadable entries are skipped, the rest of the match still counts
            Err(e) => warn!(error = %e, "Error accessing path"),
        }
    }

    if paths.is_empty() {
        return Err(SourceError::NotFound(format!(
            "No files match pattern: {}",
            pattern
        )));
    }

    paths.sort();
    Ok(paths)
}

/// Split an S3 glob URI into `(bucket, listing prefix, key pattern)`.
///
/// The prefix runs up to the last `/` before the first glob character:
/// `s3://b/buildings/**/*.parquet` lists `buildings/`.
pub fn parse_s3_glob_uri(uri: &str) -> Result<(String, String, String), SourceError> {
    let (bucket, key) = S3Source::parse_uri(uri)?;

    let glob_byte_pos = key
        .char_indices()
        .find(|(_, c)| GLOB_CHARS.contains(c))
        .map(|(pos, _)| pos);

    let prefix = match glob_byte_pos {
        Some(pos) => {
            let prefix_end = key[..pos].rfind('/').map(|i| i + 1).unwrap_or(0);
            key[..prefix_end].to_string()
        }
        None => key.clone(),
    };

    Ok((bucket, prefix, key))
}

/// List the objects matching an S3 glob pattern, as sorted `s3://` URIs.
pub async fn expand_s3_glob(
    uri: &str,
    s3_config: Option<S3Config>,
) -> Result<Vec<String>, SourceError> {
    let (bucket, prefix, pattern) = parse_s3_glob_uri(uri)?;
    let client = s3_config.unwrap_or_default().client().await;

    // `*` stays within one path segment, `**` crosses segments
    let matcher = GlobBuilder::new(&pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| {
            SourceError::FileSystemError(format!("Invalid glob pattern '{}': {}", pattern, e))
        })?
        .compile_matcher();

    let mut keys: Vec<String> = Vec::new();
    let mut continuation_token: Option<String> = None;

    loop {
        let mut request = client
            .list_objects_v2()
            .bucket(&bucket)
            .prefix(&prefix)
            .max_keys(1000);
        if let Some(token) = continuation_token.take() {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| S3Source::map_sdk_error(&bucket, "(list)", e))?;

        for object in response.contents() {
            if let Some(key) = object.key() {
                if matcher.is_match(key) {
                    keys.push(format!("s3://{}/{}", bucket, key));
                }
            }
        }

        if response.is_truncated() == Some(true) {
            continuation_token = response.next_continuation_token().map(str::to_string);
        } else {
            break;
        }
    }

    if keys.is_empty() {
        return Err(SourceError::NotFound(format!(
            "No S3 objects match pattern: {}",
            uri
        )));
    }

    keys.sort();
    debug!(pattern = %uri, matches = keys.len(), "Expanded S3 glob");
    Ok(keys)
}

/// Expand `path` when it is a glob, local or S3; other paths pass through.
pub async fn expand_path(
    path: &str,
    s3_config: Option<&S3Config>,
) -> Result<Vec<String>, SourceError> {
    if !is_glob_pattern(path) {
        return Ok(vec![path.to_string()]);
    }
    if is_s3_uri(path) {
        expand_s3_glob(path, s3_config.cloned()).await
    } else {
        expand_local_glob(path)
    }
}
