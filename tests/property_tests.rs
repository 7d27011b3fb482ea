//! Property-based tests for path resolution and manifest filtering.
//!
//! The resolver is exercised with a fixed remote probe and a cache layer
//! that never produces a file, so no test touches the network or disk.

use std::path::PathBuf;
use std::sync::Arc;

use geosource::decode::manifest::drop_manifest_rows;
use geosource::error::SourceError;
use geosource::resolve::{
    zip_cache_warning, AssumeRemote, CacheKind, CacheLayer, CacheOptions, Location, Resolver,
    StorageOptions,
};
use geosource::source::S3Config;
use polars::prelude::*;
use proptest::prelude::*;

/// Cache layer that always fails, forcing the uncached fallback.
#[derive(Debug)]
struct FailingCache;

impl CacheLayer for FailingCache {
    fn open_local(
        &self,
        _kind: CacheKind,
        target: &str,
        _options: &CacheOptions,
        _s3: Option<&S3Config>,
    ) -> Result<PathBuf, SourceError> {
        Err(SourceError::NotFound(target.to_string()))
    }
}

fn offline_resolver(remote: bool) -> Resolver {
    Resolver::new(StorageOptions::new())
        .with_cache_layer(Arc::new(FailingCache))
        .with_probe(Arc::new(AssumeRemote(remote)))
}

fn arb_segment() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,12}"
}

fn arb_extension() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("zip"),
        Just("ZIP"),
        Just("shp"),
        Just("json"),
        Just("geojson"),
        Just("parquet"),
    ]
}

fn arb_local_path() -> impl Strategy<Value = (String, &'static str)> {
    (prop::collection::vec(arb_segment(), 1..4), arb_segment(), arb_extension()).prop_map(
        |(dirs, stem, ext)| (format!("/{}/{}.{}", dirs.join("/"), stem, ext), ext),
    )
}

fn arb_cache_kind() -> impl Strategy<Value = CacheKind> {
    prop_oneof![
        Just(CacheKind::Simple),
        Just(CacheKind::File),
        Just(CacheKind::Block)
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Local paths get a `zip://` prefix exactly when they end in `.zip`.
    #[test]
    fn prop_local_zip_prefix((path, ext) in arb_local_path()) {
        let resolved = offline_resolver(false).resolve(&path);
        if ext.eq_ignore_ascii_case("zip") {
            prop_assert_eq!(resolved, format!("zip://{}", path));
        } else {
            prop_assert_eq!(resolved, path);
        }
    }

    /// Resolving twice never stacks prefixes.
    #[test]
    fn prop_resolution_is_idempotent((path, _ext) in arb_local_path()) {
        let resolver = offline_resolver(false);
        let once = resolver.resolve(&path);
        let twice = resolver.resolve(&once);
        prop_assert_eq!(once, twice);
    }

    /// Remote resources are never rewritten.
    #[test]
    fn prop_remote_paths_unchanged((path, _ext) in arb_local_path()) {
        let url = format!("https://example.org{}", path);
        prop_assert_eq!(offline_resolver(true).resolve(&url), url);
    }

    /// A failing cache falls back to the target with the marker stripped.
    #[test]
    fn prop_cache_failure_falls_back((path, ext) in arb_local_path(), kind in arb_cache_kind()) {
        let chained = format!("{}{}", kind.marker(), path);
        let resolved = offline_resolver(false).resolve(&chained);
        prop_assert!(!resolved.contains("::"));
        prop_assert!(resolved.ends_with(&path));
        prop_assert_eq!(resolved.starts_with("zip://"), ext.eq_ignore_ascii_case("zip"));
    }

    /// Cache-chained zip paths warn unless `same_names` is true.
    #[test]
    fn prop_zip_cache_warning(
        stem in arb_segment(),
        kind in arb_cache_kind(),
        same_names in prop::option::of(any::<bool>()),
    ) {
        let path = format!("{}https://example.org/{}.zip", kind.marker(), stem);
        let mut cache = CacheOptions::new();
        cache.same_names = same_names;
        let storage = StorageOptions::new().with_cache(kind, cache);

        let warning = zip_cache_warning(&path, &storage);
        prop_assert_eq!(warning.is_some(), same_names != Some(true));
        if let Some(message) = warning {
            prop_assert!(message.contains("same_names = True"));
        }
    }

    /// Archive locations print back to the string they were parsed from.
    #[test]
    fn prop_archive_location_round_trip(member in arb_segment(), (path, _ext) in arb_local_path()) {
        let url = format!("zip://{}.shp::{}", member, path);
        let location = Location::parse(&url);
        prop_assert!(location.is_archive());
        prop_assert_eq!(location.to_string(), url);
    }

    /// No row keyed under `manifest/` survives filtering; every other row does.
    #[test]
    fn prop_manifest_rows_dropped(
        keys in prop::collection::vec(
            prop_oneof![
                arb_segment().prop_map(|s| format!("data/{}.csv", s)),
                arb_segment().prop_map(|s| format!("manifest/{}/manifest.json", s)),
                arb_segment().prop_map(|s| format!("inv/manifest/{}", s)),
            ],
            0..20,
        )
    ) {
        let n = keys.len();
        let frame = DataFrame::new(vec![
            Series::new("Bucket".into(), vec!["b"; n]).into_column(),
            Series::new("Key".into(), keys.clone()).into_column(),
            Series::new("Size".into(), vec![1i64; n]).into_column(),
            Series::new("Created".into(), vec!["2024-01-01"; n]).into_column(),
        ])
        .unwrap();

        let filtered = drop_manifest_rows(&frame).unwrap();
        let kept: Vec<String> = filtered
            .column("Key")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        let expected: Vec<String> = keys.into_iter().filter(|k| !k.contains("manifest/")).collect();
        prop_assert_eq!(kept, expected);
    }
}
