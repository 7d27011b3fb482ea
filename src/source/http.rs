//! HTTP(S) source implementation

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use super::traits::StreamSource;
use crate::error::SourceError;

/// A remote file fetched with a plain GET.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    /// Prepare a GET for `url`. No request is sent until `read_all`.
    pub fn new(url: impl Into<String>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SourceError::HttpError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StreamSource for HttpSource {
    async fn read_all(&self) -> Result<Bytes, SourceError> {
        debug!(url = %self.url, "HTTP GET");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::HttpError(format!("{}: {}", self.url, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(self.url.clone()));
        }
        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(SourceError::PermissionDenied(self.url.clone()));
        }
        if !status.is_success() {
            return Err(SourceError::HttpError(format!(
                "{} returned status {}",
                self.url, status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::HttpError(format!("{}: {}", self.url, e)))?;
        info!(url = %self.url, size_bytes = bytes.len(), "Downloaded remote file");
        Ok(bytes)
    }

    fn location(&self) -> String {
        self.url.clone()
    }
}

impl std::fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSource").field("url", &self.url).finish()
    }
}
