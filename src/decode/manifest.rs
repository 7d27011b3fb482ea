//! S3 inventory manifests and their CSV shards.

use std::collections::HashSet;
use std::io::Cursor;

use polars::prelude::*;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{DecodeError, ReaderError};
use crate::frame::unique_name;

/// Column names of an inventory CSV shard.
pub const MANIFEST_COLUMNS: [&str; 4] = ["Bucket", "Key", "Size", "Created"];

/// Rows whose key contains this are the inventory's own files.
pub const MANIFEST_DIR: &str = "manifest/";

/// `manifest.json` of an S3 inventory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub source_bucket: String,
    pub files: Vec<ManifestFile>,
}

/// One shard listed in a manifest.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManifestFile {
    pub key: String,
    /// `size`, `MD5checksum` and anything else the inventory adds
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Manifest(e.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.key.as_str())
    }
}

/// Read one header-less shard into the four manifest columns.
///
/// `Key` is always a string column, even when every key looks numeric.
pub fn read_shard(bytes: &[u8], name: &str) -> Result<DataFrame, ReaderError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(empty_shard()?);
    }

    let mut frame = CsvReadOptions::default()
        .with_has_header(false)
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()?;

    if frame.width() != MANIFEST_COLUMNS.len() {
        return Err(DecodeError::Manifest(format!(
            "{}: expected {} columns, found {}",
            name,
            MANIFEST_COLUMNS.len(),
            frame.width()
        ))
        .into());
    }
    frame.set_column_names(MANIFEST_COLUMNS)?;

    let key = frame.column("Key")?.cast(&DataType::String)?;
    frame.with_column(key)?;
    Ok(frame)
}

fn empty_shard() -> PolarsResult<DataFrame> {
    let columns = MANIFEST_COLUMNS
        .iter()
        .map(|name| {
            let dtype = if *name == "Size" { DataType::Int64 } else { DataType::String };
            Series::new_empty((*name).into(), &dtype).into_column()
        })
        .collect();
    DataFrame::new(columns)
}

/// Drop rows whose `Key` points into the manifest directory.
pub fn drop_manifest_rows(frame: &DataFrame) -> Result<DataFrame, ReaderError> {
    let mask: BooleanChunked = frame
        .column("Key")?
        .str()?
        .into_iter()
        .map(|key| !key.is_some_and(|key| key.contains(MANIFEST_DIR)))
        .collect();
    Ok(frame.filter(&mask)?)
}

/// Regular expression whose groups become columns extracted from `Key`.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    regex: Regex,
    names: Vec<String>,
}

impl KeyPattern {
    /// Compile `pattern`; named groups keep their name, unnamed groups are
    /// numbered from 0 in order of appearance.
    pub fn new(pattern: &str) -> Result<Self, DecodeError> {
        let regex = Regex::new(pattern)
            .map_err(|e| DecodeError::Manifest(format!("invalid extract_key_regex: {}", e)))?;
        let names = regex
            .capture_names()
            .skip(1)
            .enumerate()
            .map(|(idx, name)| name.map(str::to_string).unwrap_or_else(|| idx.to_string()))
            .collect();
        Ok(Self { regex, names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Append one string column per group, aligned with the rows of `frame`.
    ///
    /// Keys that do not match get nulls in every extracted column. A group
    /// named like an existing column (`Key`, `Size`, ...) gets a `.N` suffix.
    pub fn extract(&self, frame: &DataFrame) -> Result<DataFrame, ReaderError> {
        let keys = frame.column("Key")?.str()?;
        let mut values: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(keys.len()); self.names.len()];

        for key in keys.into_iter() {
            let captures = key.and_then(|key| self.regex.captures(key));
            for (idx, column) in values.iter_mut().enumerate() {
                let value = captures
                    .as_ref()
                    .and_then(|c| c.get(idx + 1))
                    .map(|m| m.as_str().to_string());
                column.push(value);
            }
        }

        let mut taken: HashSet<String> = frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let extracted: Vec<Column> = self
            .names
            .iter()
            .zip(values)
            .map(|(name, values)| {
                let name = if taken.contains(name) {
                    unique_name(name, &taken)
                } else {
                    name.clone()
                };
                taken.insert(name.clone());
                Series::new(name.into(), values).into_column()
            })
            .collect();
        Ok(frame.hstack(&extracted)?)
    }
}
