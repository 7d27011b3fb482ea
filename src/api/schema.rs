//! Schema descriptors reported to the host before any data is read.

use std::collections::BTreeMap;

use polars::prelude::{DataFrame, Schema as PolarsSchema};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::frame::{dtype_name, frame_dtypes, GeoFrame, GEOMETRY_DTYPE};

/// Column dtypes plus shape and partitioning of a source.
///
/// `shape` is `(rows, columns)`; rows are `None` when the source cannot
/// know them without reading everything.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub dtype: BTreeMap<String, String>,
    pub shape: (Option<usize>, usize),
    pub npartitions: usize,
    pub extra_metadata: Map<String, Value>,
}

impl Schema {
    pub fn new(dtype: BTreeMap<String, String>, rows: Option<usize>, npartitions: usize) -> Self {
        let columns = dtype.len();
        Self {
            dtype,
            shape: (rows, columns),
            npartitions,
            extra_metadata: Map::new(),
        }
    }

    /// Schema of a single-partition vector table; the row count is not reported.
    pub fn from_geoframe(frame: &GeoFrame) -> Self {
        Self::new(frame.dtypes(), None, 1)
    }

    /// Schema of an eager table split into `npartitions` partitions.
    pub fn from_frame(frame: &DataFrame, npartitions: usize) -> Self {
        Self::new(frame_dtypes(frame, None), Some(frame.height()), npartitions)
    }

    /// Schema of a lazy scan, marking `geometry_column` when present.
    pub fn from_polars(schema: &PolarsSchema, geometry_column: Option<&str>, npartitions: usize) -> Self {
        let dtype = schema
            .iter()
            .map(|(name, dtype)| {
                let name = name.to_string();
                let dtype = if Some(name.as_str()) == geometry_column {
                    GEOMETRY_DTYPE.to_string()
                } else {
                    dtype_name(dtype)
                };
                (name, dtype)
            })
            .collect();
        Self::new(dtype, None, npartitions)
    }

    pub fn with_extra_metadata(mut self, extra_metadata: Map<String, Value>) -> Self {
        self.extra_metadata = extra_metadata;
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.dtype.keys().map(String::as_str)
    }
}
