//! Data sources exposed to the cataloging host.
//!
//! # Module Structure
//! - `traits`: the [`DataSource`] lifecycle, [`SourceState`] and the
//!   object-safe [`DynSource`]
//! - `schema`: [`Schema`] descriptors
//! - `options`: construction arguments of each driver
//! - `file`, `sql`, `parquet`, `manifest`, `regionmask`: the drivers
//! - `registry`: driver name to constructor
//!
//! # Example
//! ```no_run
//! use geosource::api::{DataSource, FileSourceArgs, GeoFileSource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut source = GeoFileSource::geojson(FileSourceArgs::new("countries.geo.json"))?;
//! let schema = source.schema()?;
//! println!("{:?}", schema.dtype);
//! let frame = source.read()?;
//! println!("{} rows", frame.height());
//! # Ok(())
//! # }
//! ```

pub mod file;
pub mod manifest;
pub mod options;
pub mod parquet;
pub mod regionmask;
pub mod registry;
pub mod schema;
pub mod sql;
pub mod traits;

pub use file::GeoFileSource;
pub use manifest::{resolve_manifest_date, S3ManifestSource};
pub use options::{
    FileSourceArgs, ManifestSourceArgs, ParquetSourceArgs, RegionmaskArgs, SqlSourceArgs,
};
pub use parquet::GeoParquetSource;
pub use regionmask::RegionmaskSource;
pub use registry::{Registry, SourceConstructor};
pub use schema::Schema;
pub use sql::GeoSqlSource;
pub use traits::{Container, DataSource, DynSource, SourceState};
