//! Path resolution for file-based sources.
//!
//! A user path may be a plain local path, an HTTP(S) URL, a cache-chained
//! URL (`simplecache::https://...`) or a zip archive, optionally narrowed to
//! a member (`zip://<glob>::<archive>`). [`Resolver::resolve`] rewrites it
//! into the string handed to the decoders:
//!
//! 1. A cache-chained path goes through the [`CacheLayer`]; when that fails
//!    or leaves no local file, the uncached target is used instead.
//! 2. Otherwise a configured [`LegacyCache`] materialises the path and
//!    supplies the local copy.
//! 3. Otherwise the path is used unchanged.
//!
//! The candidate is then probed; a path that is not a live remote resource
//! and whose last component ends in `.zip` gets a `zip://` prefix.
//!
//! Resolution never fails. Every fallback is logged at debug level.

mod cache;
mod location;
mod options;
mod remote;

use std::sync::Arc;

use tracing::{debug, warn};

pub use cache::{CacheLayer, DownloadCache, LegacyCache};
pub use location::{extension, file_name, has_zip_extension, Location, ZIP_PREFIX};
pub use options::{CacheKind, CacheOptions, StorageOptions};
pub use remote::{AssumeRemote, HttpProbe, RemoteProbe};

/// Resolves user paths against caches and the remote probe.
#[derive(Debug, Clone)]
pub struct Resolver {
    storage_options: StorageOptions,
    legacy_cache: Option<Arc<dyn LegacyCache>>,
    cache_layer: Arc<dyn CacheLayer>,
    probe: Arc<dyn RemoteProbe>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            storage_options: StorageOptions::default(),
            legacy_cache: None,
            cache_layer: Arc::new(DownloadCache::new()),
            probe: Arc::new(HttpProbe),
        }
    }
}

impl Resolver {
    pub fn new(storage_options: StorageOptions) -> Self {
        Self {
            storage_options,
            ..Self::default()
        }
    }

    pub fn with_legacy_cache(mut self, cache: Arc<dyn LegacyCache>) -> Self {
        self.legacy_cache = Some(cache);
        self
    }

    pub fn with_cache_layer(mut self, layer: Arc<dyn CacheLayer>) -> Self {
        self.cache_layer = layer;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn RemoteProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn storage_options(&self) -> &StorageOptions {
        &self.storage_options
    }

    /// Rewrite `path` into the form expected by the decoders.
    pub fn resolve(&self, path: &str) -> String {
        let candidate = if let Some(kind) = CacheKind::detect(path) {
            self.resolve_cached(kind, path)
        } else if let Some(cache) = &self.legacy_cache {
            resolve_legacy(cache.as_ref(), path)
        } else {
            path.to_string()
        };

        self.prefix_local_zip(candidate)
    }

    fn resolve_cached(&self, kind: CacheKind, path: &str) -> String {
        // Anything before the marker (a `zip://member::` selector) is kept
        let Some(pos) = path.find(kind.marker()) else {
            return path.to_string();
        };
        let (prefix, rest) = path.split_at(pos);
        let target = &rest[kind.marker().len()..];

        let options = self.storage_options.cache(kind).cloned().unwrap_or_default();
        let s3 = self.storage_options.s3_config();

        match self
            .cache_layer
            .open_local(kind, target, &options, s3.as_ref())
        {
            Ok(local) if local.exists() => {
                debug!(cache = %kind, path = %path, local = %local.display(), "Resolved through cache");
                format!("{}{}", prefix, local.display())
            }
            Ok(local) => {
                debug!(
                    cache = %kind,
                    local = %local.display(),
                    "Cached file missing, opening without cache"
                );
                format!("{}{}", prefix, target)
            }
            Err(e) => {
                debug!(cache = %kind, error = %e, "Cache failed, opening without cache");
                format!("{}{}", prefix, target)
            }
        }
    }

    fn prefix_local_zip(&self, candidate: String) -> String {
        if candidate.starts_with(ZIP_PREFIX) {
            return candidate;
        }
        if self.probe.is_remote(&candidate) {
            debug!(path = %candidate, "Path is remote");
            return candidate;
        }
        if has_zip_extension(&candidate) {
            debug!(path = %candidate, "Opening local zip archive");
            return format!("{}{}", ZIP_PREFIX, candidate);
        }
        candidate
    }
}

fn resolve_legacy(cache: &dyn LegacyCache, path: &str) -> String {
    if let Err(e) = cache.load(path) {
        debug!(path = %path, error = %e, "Legacy cache failed, opening without cache");
        return path.to_string();
    }
    let local = cache.path(path);
    if local.exists() {
        local.display().to_string()
    } else {
        debug!(local = %local.display(), "Legacy cache produced no file, opening without cache");
        path.to_string()
    }
}

/// Resolve `path` with the default cache layer and HTTP probe.
pub fn resolve(
    path: &str,
    legacy_cache: Option<Arc<dyn LegacyCache>>,
    storage_options: &StorageOptions,
) -> String {
    let mut resolver = Resolver::new(storage_options.clone());
    if let Some(cache) = legacy_cache {
        resolver = resolver.with_legacy_cache(cache);
    }
    resolver.resolve(path)
}

/// Warning for cache-chained zip paths that do not keep original names.
///
/// Cached files are otherwise renamed to a hash, so an archive member
/// lookup by name can fail later with a driver error.
pub fn zip_cache_warning(path: &str, storage_options: &StorageOptions) -> Option<String> {
    let kind = CacheKind::detect(path)?;
    if !path.contains("zip") {
        return None;
    }
    let same_names = storage_options
        .cache(kind)
        .map(CacheOptions::preserves_names)
        .unwrap_or(false);
    if same_names {
        return None;
    }
    let message = format!(
        "Caching a zip archive with '{kind}' requires `same_names = True` in \
         storage_options[\"{kind}\"]; the driver may fail to open '{path}' otherwise"
    );
    warn!(path = %path, cache = %kind, "{}", message);
    Some(message)
}
