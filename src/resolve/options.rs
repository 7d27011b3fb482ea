//! Storage options: cache-chain settings plus backend (S3) settings.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::source::S3Config;

/// Caching layers recognised in chained URLs such as `simplecache::https://...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheKind {
    Simple,
    File,
    Block,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [CacheKind::Block, CacheKind::File, CacheKind::Simple];

    /// Key used in `storage_options`.
    pub fn key(self) -> &'static str {
        match self {
            CacheKind::Simple => "simplecache",
            CacheKind::File => "filecache",
            CacheKind::Block => "blockcache",
        }
    }

    /// Marker used in chained URLs.
    pub fn marker(self) -> &'static str {
        match self {
            CacheKind::Simple => "simplecache::",
            CacheKind::File => "filecache::",
            CacheKind::Block => "blockcache::",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    /// First cache marker contained in `path`, if any.
    pub fn detect(path: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .filter_map(|kind| path.find(kind.marker()).map(|pos| (pos, kind)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, kind)| kind)
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Options of one caching layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CacheOptions {
    /// Keep the original file name in the cache (required for zip members).
    #[serde(default)]
    pub same_names: Option<bool>,
    /// Directory holding cached files.
    #[serde(default)]
    pub cache_storage: Option<PathBuf>,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_same_names(mut self, same_names: bool) -> Self {
        self.same_names = Some(same_names);
        self
    }

    pub fn with_cache_storage(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_storage = Some(dir.into());
        self
    }

    /// Whether original names are preserved; unset counts as false.
    pub fn preserves_names(&self) -> bool {
        self.same_names.unwrap_or(false)
    }
}

/// Options passed alongside a path: per-cache settings and backend keys.
///
/// Deserializes from a JSON object where `simplecache`, `filecache` and
/// `blockcache` hold [`CacheOptions`] and every other scalar entry is a
/// backend setting (see [`S3Config::from_dict`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct StorageOptions {
    caches: BTreeMap<CacheKind, CacheOptions>,
    backend: HashMap<String, String>,
}

impl StorageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, kind: CacheKind, options: CacheOptions) -> Self {
        self.caches.insert(kind, options);
        self
    }

    pub fn with_backend_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.backend.insert(key.into(), value.into());
        self
    }

    pub fn cache(&self, kind: CacheKind) -> Option<&CacheOptions> {
        self.caches.get(&kind)
    }

    pub fn backend(&self) -> &HashMap<String, String> {
        &self.backend
    }

    /// S3 settings, when any backend option was given.
    pub fn s3_config(&self) -> Option<S3Config> {
        if self.backend.is_empty() {
            None
        } else {
            Some(S3Config::from_dict(&self.backend))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty() && self.backend.is_empty()
    }
}

impl TryFrom<Map<String, Value>> for StorageOptions {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut options = StorageOptions::default();
        for (key, value) in map {
            if let Some(kind) = CacheKind::from_key(&key) {
                let cache: CacheOptions = serde_json::from_value(value)
                    .map_err(|e| format!("invalid options for '{}': {}", key, e))?;
                options.caches.insert(kind, cache);
                continue;
            }
            let value = match value {
                Value::String(s) => s,
                Value::Null => continue,
                Value::Bool(_) | Value::Number(_) => value.to_string(),
                other => {
                    return Err(format!(
                        "storage option '{}' must be a scalar, got {}",
                        key, other
                    ))
                }
            };
            options.backend.insert(key, value);
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_cache_marker() {
        assert_eq!(
            CacheKind::detect("simplecache::http://maps.tnc.org/files/shp/MEOW-TNC.zip"),
            Some(CacheKind::Simple)
        );
        assert_eq!(
            CacheKind::detect("zip://a*::filecache::https://x/y.zip"),
            Some(CacheKind::File)
        );
        assert_eq!(CacheKind::detect("https://x/y.zip"), None);
        assert_eq!(CacheKind::detect("simplecache:/x"), None);
    }

    #[test]
    fn test_deserialize_storage_options() {
        let options: StorageOptions = serde_json::from_value(json!({
            "simplecache": {"same_names": true, "cache_storage": "/tmp/cache"},
            "endpoint": "http://localhost:9000",
            "max_retries": 4,
            "anon": null,
        }))
        .unwrap();

        let simple = options.cache(CacheKind::Simple).unwrap();
        assert!(simple.preserves_names());
        assert_eq!(simple.cache_storage, Some(PathBuf::from("/tmp/cache")));
        assert!(options.cache(CacheKind::File).is_none());

        let s3 = options.s3_config().unwrap();
        assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(s3.max_retries, 4);
    }

    #[test]
    fn test_deserialize_rejects_nested_backend_values() {
        let result: Result<StorageOptions, _> =
            serde_json::from_value(json!({"client_kwargs": {"a": 1}}));
        assert!(result.is_err());
    }

    #[test]
    fn test_same_names_defaults_to_false() {
        assert!(!CacheOptions::new().preserves_names());
        assert!(CacheOptions::new().with_same_names(true).preserves_names());
    }

    #[test]
    fn test_no_backend_means_no_s3_config() {
        let options = StorageOptions::new().with_cache(CacheKind::Block, CacheOptions::new());
        assert!(options.s3_config().is_none());
        assert!(!options.is_empty());
    }

    #[test]
    fn test_backend_options_build_s3_config() {
        let options = StorageOptions::new()
            .with_backend_option("endpoint_url", "http://localhost:9000")
            .with_backend_option("anon", "true");
        assert_eq!(options.backend().len(), 2);
        let s3 = options.s3_config().unwrap();
        assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(s3.anon);
    }
}
