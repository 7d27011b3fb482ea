//! S3 inventory listings (`s3-manifest`): one partition per CSV shard.

use bytes::Bytes;
use chrono::{Local, NaiveDate, TimeDelta};
use futures::future::try_join_all;
use polars::prelude::*;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::options::{ManifestSourceArgs, LATEST_MANIFEST};
use super::schema::Schema;
use super::traits::{DataSource, SourceState};
use crate::codec::decompress_file;
use crate::decode::manifest::{drop_manifest_rows, read_shard};
use crate::decode::{KeyPattern, Manifest};
use crate::error::ReaderError;
use crate::source::{self, S3Config};

/// Date format of inventory manifest directories.
pub const MANIFEST_DATE_FORMAT: &str = "%Y-%m-%d";

/// The day before `today`, formatted as a manifest date.
pub fn yesterday(today: NaiveDate) -> String {
    (today - TimeDelta::days(1)).format(MANIFEST_DATE_FORMAT).to_string()
}

/// Resolve `latest` to yesterday (local time); other dates pass through.
pub fn resolve_manifest_date(date: &str) -> String {
    if date == LATEST_MANIFEST {
        yesterday(Local::now().date_naive())
    } else {
        date.to_string()
    }
}

/// Rows of an S3 inventory, one partition per shard listed in its manifest.
#[derive(Debug)]
pub struct S3ManifestSource {
    args: ManifestSourceArgs,
    /// `args.manifest_date` with `latest` resolved once, at construction
    manifest_date: String,
    key_pattern: Option<KeyPattern>,
    state: SourceState<Vec<DataFrame>>,
}

impl S3ManifestSource {
    /// Fails on an invalid `extract_key_regex`, before anything is fetched.
    pub fn new(args: ManifestSourceArgs) -> Result<Self, ReaderError> {
        let key_pattern = args
            .extract_key_regex
            .as_deref()
            .map(KeyPattern::new)
            .transpose()?;
        let manifest_date = resolve_manifest_date(&args.manifest_date);
        Ok(Self {
            args,
            manifest_date,
            key_pattern,
            state: SourceState::Unopened,
        })
    }

    /// `manifest_date` with `latest` resolved.
    pub fn manifest_date(&self) -> &str {
        &self.manifest_date
    }

    /// Location of `manifest.json`.
    pub fn manifest_url(&self) -> String {
        format!(
            "{}{}/manifest/{}/manifest.json",
            self.args.s3_prefix,
            self.args.bucket,
            self.manifest_date
        )
    }

    fn loaded(&mut self) -> Result<&Vec<DataFrame>, ReaderError> {
        let url = self.manifest_url();
        let Self {
            args,
            key_pattern,
            state,
            ..
        } = self;
        state.get_or_try_open(|| load(&url, args, key_pattern.as_ref()))
    }

    fn concatenated(&mut self) -> Result<DataFrame, ReaderError> {
        let shards = self.loaded()?;
        let mut frames = shards.iter();
        let Some(first) = frames.next() else {
            return Ok(DataFrame::empty());
        };
        let mut all = first.clone();
        for frame in frames {
            all.vstack_mut(frame)?;
        }
        Ok(all)
    }
}

fn load(
    url: &str,
    args: &ManifestSourceArgs,
    key_pattern: Option<&KeyPattern>,
) -> Result<Vec<DataFrame>, ReaderError> {
    let s3 = args.storage_options.s3_config();
    let shards = source::block_on(fetch_shards(url, &args.s3_prefix, s3.as_ref()))??;

    let frames = shards
        .iter()
        .map(|(uri, body)| shard_frame(uri, body, key_pattern).map_err(|e| e.in_file(uri.as_str())))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        manifest = %url,
        shards = frames.len(),
        rows = frames.iter().map(DataFrame::height).sum::<usize>(),
        "Opened S3 inventory"
    );
    Ok(frames)
}

/// Fetch the manifest, then every shard it lists, concurrently.
async fn fetch_shards(
    url: &str,
    prefix: &str,
    s3: Option<&S3Config>,
) -> Result<Vec<(String, Bytes)>, ReaderError> {
    let body = source::fetch(url, s3)
        .await
        .map_err(|e| ReaderError::from(e).in_file(url))?;
    let manifest = Manifest::parse(&body).map_err(|e| ReaderError::from(e).in_file(url))?;
    debug!(
        source_bucket = %manifest.source_bucket,
        shards = manifest.files.len(),
        "Parsed manifest"
    );

    let uris: Vec<String> = manifest
        .keys()
        .map(|key| format!("{}{}/{}", prefix, manifest.source_bucket, key))
        .collect();
    let bodies = try_join_all(uris.iter().map(|uri| async move {
        source::fetch(uri, s3)
            .await
            .map_err(|e| ReaderError::from(e).in_file(uri.as_str()))
    }))
    .await?;

    Ok(uris.into_iter().zip(bodies).collect())
}

fn shard_frame(uri: &str, body: &[u8], key_pattern: Option<&KeyPattern>) -> Result<DataFrame, ReaderError> {
    let csv = decompress_file(uri, body)?;
    let frame = drop_manifest_rows(&read_shard(&csv, uri)?)?;
    match key_pattern {
        Some(pattern) => pattern.extract(&frame),
        None => Ok(frame),
    }
}

impl DataSource for S3ManifestSource {
    type Output = DataFrame;

    fn name(&self) -> &'static str {
        "s3-manifest"
    }

    fn open(&mut self) -> Result<(), ReaderError> {
        self.loaded().map(|_| ())
    }

    fn is_open(&self) -> bool {
        self.state.is_open()
    }

    fn schema(&mut self) -> Result<Schema, ReaderError> {
        let npartitions = self.loaded()?.len();
        let frame = self.concatenated()?;
        Ok(Schema::from_frame(&frame, npartitions))
    }

    fn read(&mut self) -> Result<DataFrame, ReaderError> {
        self.concatenated()
    }

    fn read_partition(&mut self, index: usize) -> Result<DataFrame, ReaderError> {
        let shards = self.loaded()?;
        shards
            .get(index)
            .cloned()
            .ok_or(ReaderError::PartitionOutOfRange {
                index,
                npartitions: shards.len(),
            })
    }

    fn to_lazy(&mut self) -> Result<LazyFrame, ReaderError> {
        let shards: Vec<LazyFrame> = self.loaded()?.iter().cloned().map(IntoLazy::lazy).collect();
        if shards.is_empty() {
            return Ok(DataFrame::empty().lazy());
        }
        Ok(concat(shards, UnionArgs::default())?)
    }

    fn close(&mut self) {
        self.state.close();
    }

    fn metadata(&self) -> &Map<String, Value> {
        &self.args.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yesterday() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(yesterday(today), "2024-02-29");
    }

    #[test]
    fn test_latest_resolves_to_yesterday() {
        let expected = (Local::now() - TimeDelta::days(1)).format("%Y-%m-%d").to_string();
        assert_eq!(resolve_manifest_date("latest"), expected);
        assert_eq!(resolve_manifest_date("2024-01-05"), "2024-01-05");
    }

    #[test]
    fn test_manifest_url() {
        let args = ManifestSourceArgs::new("inventory").with_manifest_date("2024-01-05");
        let source = S3ManifestSource::new(args).unwrap();
        assert_eq!(
            source.manifest_url(),
            "s3://inventory/manifest/2024-01-05/manifest.json"
        );
    }

    #[test]
    fn test_manifest_url_from_bucket_argument() {
        let args: ManifestSourceArgs = serde_json::from_value(serde_json::json!({
            "bucket": "inventory",
            "manifest_date": "2024-01-05",
        }))
        .unwrap();
        let source = S3ManifestSource::new(args).unwrap();
        assert_eq!(
            source.manifest_url(),
            "s3://inventory/manifest/2024-01-05/manifest.json"
        );
    }

    #[test]
    fn test_latest_resolved_once() {
        let source = S3ManifestSource::new(ManifestSourceArgs::new("inventory")).unwrap();
        let date = source.manifest_date().to_string();
        assert_eq!(date, resolve_manifest_date("latest"));
        // Fixed for the source's lifetime, even across midnight
        assert_eq!(source.manifest_date(), date);
        assert_eq!(
            source.manifest_url(),
            format!("s3://inventory/manifest/{}/manifest.json", date)
        );
        assert_eq!(source.manifest_url(), source.manifest_url());
    }

    #[test]
    fn test_invalid_regex_at_construction() {
        let args = ManifestSourceArgs::new("inventory").with_extract_key_regex("(");
        assert!(S3ManifestSource::new(args).is_err());
    }

    #[test]
    fn test_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_dir = dir.path().join("inventory/manifest/2024-01-05");
        std::fs::create_dir_all(&manifest_dir).unwrap();
        std::fs::write(
            manifest_dir.join("manifest.json"),
            r#"{"sourceBucket": "images", "files": []}"#,
        )
        .unwrap();

        let args = ManifestSourceArgs::new("inventory")
            .with_manifest_date("2024-01-05")
            .with_s3_prefix(format!("{}/", dir.path().display()));
        let mut source = S3ManifestSource::new(args).unwrap();
        assert_eq!(source.read().unwrap().height(), 0);
        assert_eq!(source.schema().unwrap().npartitions, 0);
        assert_eq!(source.to_lazy().unwrap().collect().unwrap().height(), 0);
    }
}
