//! Liveness probe for remote paths.

use std::fmt::Debug;

use tracing::debug;

use crate::source::block_on;

/// Decides whether a candidate path is a live remote resource.
pub trait RemoteProbe: Send + Sync + Debug {
    fn is_remote(&self, candidate: &str) -> bool;
}

/// HEAD request against `http`/`https` URLs.
///
/// Anything that does not parse as an HTTP(S) URL, and any request error,
/// counts as not remote. Success and redirect statuses count as remote.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpProbe;

impl RemoteProbe for HttpProbe {
    fn is_remote(&self, candidate: &str) -> bool {
        let url = match url::Url::parse(candidate) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                debug!(path = %candidate, scheme = url.scheme(), "Not probing non-HTTP path");
                return false;
            }
            Err(e) => {
                debug!(path = %candidate, error = %e, "Not a URL, treating as local");
                return false;
            }
        };

        let outcome = block_on(async move {
            let client = reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()?;
            client.head(url).send().await
        });

        match outcome {
            Ok(Ok(response)) => {
                let status = response.status();
                debug!(path = %candidate, status = %status, "Probed remote path");
                status.is_success() || status.is_redirection()
            }
            Ok(Err(e)) => {
                debug!(path = %candidate, error = %e, "Remote probe failed");
                false
            }
            Err(e) => {
                debug!(path = %candidate, error = %e, "Remote probe could not run");
                false
            }
        }
    }
}

/// Probe with fixed answers, for callers that already know the path kind.
#[derive(Debug, Clone, Copy)]
pub struct AssumeRemote(pub bool);

impl RemoteProbe for AssumeRemote {
    fn is_remote(&self, _candidate: &str) -> bool {
        self.0
    }
}
