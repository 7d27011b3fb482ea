//! Data-source adapters for geospatial datasets
//!
//! This library loads vector files (GeoJSON, shapefiles, zipped or not),
//! PostGIS and SpatiaLite query results, GeoParquet datasets and S3
//! inventory manifests into Polars DataFrames, behind a common
//! open/schema/read/close lifecycle that a cataloging host can drive.
//!
//! File paths go through [`resolve::Resolver`] first, which handles
//! cache-chained URLs (`simplecache::https://...`), remote probing and
//! `zip://` archive prefixes.

pub mod api;
pub mod codec;
pub mod decode;
pub mod error;
pub mod frame;
pub mod regions;
pub mod resolve;
pub mod source;

// Re-export main types
pub use api::{
    Container, DataSource, DynSource, FileSourceArgs, GeoFileSource, GeoParquetSource,
    GeoSqlSource, ManifestSourceArgs, ParquetSourceArgs, RegionmaskArgs, RegionmaskSource,
    Registry, S3ManifestSource, Schema, SourceState, SqlSourceArgs,
};
pub use codec::Codec;
pub use decode::{BBox, Driver};
pub use error::{DecodeError, ReaderError, SchemaError, SourceError};
pub use frame::GeoFrame;
pub use regions::{RegionOptions, Regions};
pub use resolve::{resolve, CacheKind, CacheOptions, Resolver, StorageOptions};
pub use source::{BoxedSource, LocalSource, S3Config, S3Source, StreamSource};
