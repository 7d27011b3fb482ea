//! S3 objects: manifests, inventory shards and archives fetched whole.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info};

use super::traits::StreamSource;
use crate::error::SourceError;

/// Default number of retry attempts for transient S3 failures.
pub const DEFAULT_MAX_RETRIES: usize = 2;

/// Accepted spellings of each backend key; the first is canonical.
const ENDPOINT_KEYS: &[&str] = &["endpoint_url", "endpoint"];
const KEY_ID_KEYS: &[&str] = &["key", "aws_access_key_id"];
const SECRET_KEYS: &[&str] = &["secret", "aws_secret_access_key"];
const TOKEN_KEYS: &[&str] = &["token", "aws_session_token"];
const REGION_KEYS: &[&str] = &["region_name", "region"];

/// S3 connection overrides taken from a source's `storage_options`.
///
/// Unset fields fall back to the standard AWS environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    /// Custom endpoint (MinIO, LocalStack, R2)
    pub endpoint: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub region: Option<String>,
    /// Unsigned requests, for public buckets
    pub anon: bool,
    /// Retries after the first attempt
    pub max_retries: usize,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            session_token: None,
            region: None,
            anon: false,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

fn lookup(opts: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| opts.get(*key)).cloned()
}

impl S3Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read S3 settings out of flattened storage options.
    ///
    /// Both the short names (`key`, `secret`, `token`, `endpoint_url`,
    /// `region_name`) and the AWS names are accepted; the short name wins
    /// when both are present. `anon` is true for `"true"`/`"1"`. Anything
    /// unparseable keeps its default.
    pub fn from_dict(opts: &HashMap<String, String>) -> Self {
        Self {
            endpoint: lookup(opts, ENDPOINT_KEYS),
            aws_access_key_id: lookup(opts, KEY_ID_KEYS),
            aws_secret_access_key: lookup(opts, SECRET_KEYS),
            session_token: lookup(opts, TOKEN_KEYS),
            region: lookup(opts, REGION_KEYS),
            anon: opts
                .get("anon")
                .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1")),
            max_retries: opts
                .get("max_retries")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_RETRIES),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.aws_access_key_id = Some(access_key_id.into());
        self.aws_secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_anon(mut self, anon: bool) -> Self {
        self.anon = anon;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// True when nothing overrides the environment (max_retries aside).
    pub fn is_empty(&self) -> bool {
        self.endpoint.is_none()
            && self.aws_access_key_id.is_none()
            && self.aws_secret_access_key.is_none()
            && self.session_token.is_none()
            && self.region.is_none()
            && !self.anon
    }

    /// Build a client; explicit settings take precedence over the environment.
    pub async fn client(&self) -> Client {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &self.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if self.anon {
            loader = loader.no_credentials();
        } else if let (Some(id), Some(secret)) =
            (&self.aws_access_key_id, &self.aws_secret_access_key)
        {
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                id.clone(),
                secret.clone(),
                self.session_token.clone(),
                None,
                "storage_options",
            ));
        }

        let shared = loader.load().await;
        // The SDK counts the initial attempt
        let retry = RetryConfig::standard().with_max_attempts(self.max_retries as u32 + 1);
        let mut builder = aws_sdk_s3::config::Builder::from(&shared).retry_config(retry);
        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Client::from_conf(builder.build())
    }
}

/// Error kinds recognised in SDK error messages.
const NOT_FOUND_MARKERS: &[&str] = &["NoSuchKey", "NotFound", "404"];
const DENIED_MARKERS: &[&str] = &[
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "403",
];

/// One S3 object, fetched with a single GetObject.
pub struct S3Source {
    client: Client,
    bucket: String,
    key: String,
    object_size: u64,
}

impl S3Source {
    /// Open `s3://bucket/key`; a HEAD call checks the object exists.
    pub async fn open(uri: &str, config: Option<S3Config>) -> Result<Self, SourceError> {
        let (bucket, key) = Self::parse_uri(uri)?;
        let client = config.unwrap_or_default().client().await;

        let head = client
            .head_object()
            .bucket(&bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(&bucket, &key, e))?;
        let object_size = head.content_length().map_or(0, |n| n.max(0) as u64);
        info!(uri = %uri, size_bytes = object_size, "Opened S3 object");

        Ok(Self {
            client,
            bucket,
            key,
            object_size,
        })
    }

    /// Split `s3://bucket/key` into its bucket and key.
    pub fn parse_uri(uri: &str) -> Result<(String, String), SourceError> {
        let invalid = |why: &str| SourceError::S3Error(format!("Invalid S3 URI ({}): {}", why, uri));

        let rest = uri
            .strip_prefix("s3://")
            .ok_or_else(|| invalid("expected s3:// scheme"))?;
        match rest.split_once('/') {
            None => Err(invalid("missing key")),
            Some(("", _)) => Err(invalid("empty bucket")),
            Some((_, "")) => Err(invalid("empty key")),
            Some((bucket, key)) => Ok((bucket.to_string(), key.to_string())),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Classify an SDK error by its message.
    pub fn map_sdk_error<E: std::fmt::Display>(bucket: &str, key: &str, err: E) -> SourceError {
        let msg = err.to_string();
        let uri = format!("s3://{}/{}", bucket, key);
        let has = |markers: &[&str]| markers.iter().any(|m| msg.contains(m));

        if msg.contains("NoSuchBucket") {
            SourceError::NotFound(format!("Bucket not found: {}", bucket))
        } else if has(NOT_FOUND_MARKERS) {
            SourceError::NotFound(uri)
        } else if has(DENIED_MARKERS) {
            SourceError::AuthenticationFailed(format!("Access denied to {}: {}", uri, msg))
        } else {
            SourceError::S3Error(format!("{}: {}", uri, msg))
        }
    }
}

#[async_trait]
impl StreamSource for S3Source {
    async fn read_all(&self) -> Result<Bytes, SourceError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(&self.bucket, &self.key, e))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| SourceError::S3Error(format!("{}: body read failed: {}", self.location(), e)))?
            .into_bytes();
        debug!(uri = %self.location(), bytes = bytes.len(), "Fetched S3 object");
        Ok(bytes)
    }

    fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

impl std::fmt::Debug for S3Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Source")
            .field("uri", &self.location())
            .field("object_size", &self.object_size)
            .finish()
    }
}
