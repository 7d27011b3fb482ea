//! GeoParquet datasets: one or more parquet files, one partition per file.

use polars::prelude::*;
use serde_json::{Map, Value};
use tracing::info;

use super::options::ParquetSourceArgs;
use super::schema::Schema;
use super::traits::{DataSource, SourceState};
use crate::decode::parquet::{geometry_to_wkt, scan_file};
use crate::error::ReaderError;
use crate::frame::GeoFrame;
use crate::source::{self, expand_path};

/// Lazy scans of every file matched by the source path.
#[derive(Clone)]
struct Partitions {
    paths: Vec<String>,
    frames: Vec<LazyFrame>,
}

/// A GeoParquet file or glob of files, scanned lazily.
pub struct GeoParquetSource {
    args: ParquetSourceArgs,
    state: SourceState<Partitions>,
}

impl std::fmt::Debug for GeoParquetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoParquetSource")
            .field("urlpath", &self.args.urlpath)
            .field("open", &self.state.is_open())
            .finish()
    }
}

impl GeoParquetSource {
    pub fn new(args: ParquetSourceArgs) -> Self {
        Self {
            args,
            state: SourceState::Unopened,
        }
    }

    /// Files backing the partitions, once open.
    pub fn paths(&mut self) -> Result<Vec<String>, ReaderError> {
        Ok(self.loaded()?.paths.clone())
    }

    fn loaded(&mut self) -> Result<&Partitions, ReaderError> {
        let Self { args, state } = self;
        state.get_or_try_open(|| scan(args))
    }

    fn materialize(&self, frame: LazyFrame) -> Result<GeoFrame, ReaderError> {
        let column = self.args.geometry_column.as_str();
        let frame = geometry_to_wkt(frame.collect()?, column)?;
        let geometry_column = frame
            .get_column_index(column)
            .map(|_| column.to_string());
        Ok(GeoFrame::new(frame, geometry_column))
    }
}

fn scan(args: &ParquetSourceArgs) -> Result<Partitions, ReaderError> {
    let s3 = args.storage_options.s3_config();
    let paths = source::block_on(expand_path(&args.urlpath, s3.as_ref()))??;

    let frames = paths
        .iter()
        .map(|path| scan_file(path, s3.as_ref()).map_err(|e| e.in_file(path.as_str())))
        .collect::<Result<Vec<_>, _>>()?;

    info!(urlpath = %args.urlpath, files = paths.len(), "Opened GeoParquet dataset");
    Ok(Partitions { paths, frames })
}

impl DataSource for GeoParquetSource {
    type Output = GeoFrame;

    fn name(&self) -> &'static str {
        "geoparquet"
    }

    fn open(&mut self) -> Result<(), ReaderError> {
        self.loaded().map(|_| ())
    }

    fn is_open(&self) -> bool {
        self.state.is_open()
    }

    fn schema(&mut self) -> Result<Schema, ReaderError> {
        let npartitions = self.loaded()?.frames.len();
        let polars_schema = self.to_lazy()?.collect_schema()?;
        Ok(Schema::from_polars(
            &polars_schema,
            Some(self.args.geometry_column.as_str()),
            npartitions,
        ))
    }

    fn read(&mut self) -> Result<GeoFrame, ReaderError> {
        let lazy = self.to_lazy()?;
        self.materialize(lazy)
    }

    fn read_partition(&mut self, index: usize) -> Result<GeoFrame, ReaderError> {
        let partitions = self.loaded()?;
        let frame = partitions
            .frames
            .get(index)
            .cloned()
            .ok_or(ReaderError::PartitionOutOfRange {
                index,
                npartitions: partitions.frames.len(),
            })?;
        self.materialize(frame)
    }

    /// Union of all partitions; the geometry column stays WKB.
    fn to_lazy(&mut self) -> Result<LazyFrame, ReaderError> {
        let partitions = self.loaded()?;
        match partitions.frames.as_slice() {
            [single] => Ok(single.clone()),
            frames => Ok(concat(frames, UnionArgs::default())?),
        }
    }

    fn close(&mut self) {
        self.state.close();
    }

    fn metadata(&self) -> &Map<String, Value> {
        &self.args.metadata
    }
}
