//! Construction arguments of each driver.
//!
//! Hosts pass arguments as a JSON object, so every struct derives
//! `Deserialize`; Rust callers use the `new` + `with_*` builders instead.
//!
//! # Example
//! ```
//! use geosource::api::FileSourceArgs;
//! use geosource::decode::BBox;
//!
//! let args = FileSourceArgs::new("data/countries.geo.json")
//!     .with_driver("GeoJSON")
//!     .with_bbox(BBox::new(-10.0, 30.0, 40.0, 60.0));
//! assert_eq!(args.urlpath, "data/countries.geo.json");
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::decode::{BBox, DEFAULT_GEOM_COL};
use crate::error::ReaderError;
use crate::frame::DEFAULT_GEOMETRY_COLUMN;
use crate::regions::RegionOptions;
use crate::resolve::StorageOptions;

/// Default `s3_prefix` of the manifest source.
pub const DEFAULT_S3_PREFIX: &str = "s3://";

/// `manifest_date` selecting yesterday's manifest.
pub const LATEST_MANIFEST: &str = "latest";

/// Arguments of the vector file drivers (`geojson`, `shapefile`, `geopandasfile`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileSourceArgs {
    /// Local path, URL, cache-chained URL or `zip://` archive path
    pub urlpath: String,
    /// OGR-style driver name; inferred from the extension when unset
    #[serde(default)]
    pub driver: Option<String>,
    /// Keep only features whose bounding box meets this box
    #[serde(default)]
    pub bbox: Option<BBox>,
    #[serde(default)]
    pub storage_options: StorageOptions,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl FileSourceArgs {
    pub fn new(urlpath: impl Into<String>) -> Self {
        Self {
            urlpath: urlpath.into(),
            driver: None,
            bbox: None,
            storage_options: StorageOptions::default(),
            metadata: Map::new(),
        }
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_storage_options(mut self, storage_options: StorageOptions) -> Self {
        self.storage_options = storage_options;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Arguments of the `postgis` and `spatialite` drivers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SqlSourceArgs {
    /// Database URI (`postgres://...`, `sqlite:...` or a SQLite file path)
    pub uri: String,
    /// Full query; takes precedence over `table`
    #[serde(default)]
    pub sql_expr: Option<String>,
    /// Table read with `SELECT * FROM <table>`
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_geom_col")]
    pub geom_col: String,
    /// SQLite extension to load before querying
    #[serde(default)]
    pub spatialite_extension: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_geom_col() -> String {
    DEFAULT_GEOM_COL.to_string()
}

impl SqlSourceArgs {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            sql_expr: None,
            table: None,
            geom_col: default_geom_col(),
            spatialite_extension: None,
            metadata: Map::new(),
        }
    }

    pub fn with_sql_expr(mut self, sql_expr: impl Into<String>) -> Self {
        self.sql_expr = Some(sql_expr.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_geom_col(mut self, geom_col: impl Into<String>) -> Self {
        self.geom_col = geom_col.into();
        self
    }

    pub fn with_spatialite_extension(mut self, extension: impl Into<String>) -> Self {
        self.spatialite_extension = Some(extension.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// The query to run: `sql_expr` if given, else a full read of `table`.
    pub fn query(&self) -> Result<String, ReaderError> {
        match (&self.sql_expr, &self.table) {
            (Some(sql), _) => Ok(sql.clone()),
            (None, Some(table)) => Ok(format!("SELECT * FROM {}", table)),
            (None, None) => Err(ReaderError::Configuration(
                "Must provide either a table name or a SQL expression (sql_expr)".to_string(),
            )),
        }
    }
}

/// Arguments of the `geoparquet` driver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParquetSourceArgs {
    /// File path, S3 URI or glob over either
    pub urlpath: String,
    /// Column holding WKB geometries
    #[serde(default = "default_geometry_column")]
    pub geometry_column: String,
    #[serde(default)]
    pub storage_options: StorageOptions,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_geometry_column() -> String {
    DEFAULT_GEOMETRY_COLUMN.to_string()
}

impl ParquetSourceArgs {
    pub fn new(urlpath: impl Into<String>) -> Self {
        Self {
            urlpath: urlpath.into(),
            geometry_column: default_geometry_column(),
            storage_options: StorageOptions::default(),
            metadata: Map::new(),
        }
    }

    pub fn with_geometry_column(mut self, column: impl Into<String>) -> Self {
        self.geometry_column = column.into();
        self
    }

    pub fn with_storage_options(mut self, storage_options: StorageOptions) -> Self {
        self.storage_options = storage_options;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Arguments of the `s3-manifest` driver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManifestSourceArgs {
    /// Inventory destination bucket (path prefix for non-S3 prefixes)
    #[serde(alias = "s3_manifest_bucket")]
    pub bucket: String,
    /// `YYYY-MM-DD`, or `latest` for yesterday
    #[serde(default = "default_manifest_date")]
    pub manifest_date: String,
    /// Prefix put in front of bucket names, `s3://` unless overridden
    #[serde(default = "default_s3_prefix")]
    pub s3_prefix: String,
    /// Regular expression whose groups are extracted from each `Key`
    #[serde(default)]
    pub extract_key_regex: Option<String>,
    #[serde(default)]
    pub storage_options: StorageOptions,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_manifest_date() -> String {
    LATEST_MANIFEST.to_string()
}

fn default_s3_prefix() -> String {
    DEFAULT_S3_PREFIX.to_string()
}

impl ManifestSourceArgs {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            manifest_date: default_manifest_date(),
            s3_prefix: default_s3_prefix(),
            extract_key_regex: None,
            storage_options: StorageOptions::default(),
            metadata: Map::new(),
        }
    }

    pub fn with_manifest_date(mut self, date: impl Into<String>) -> Self {
        self.manifest_date = date.into();
        self
    }

    pub fn with_s3_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.s3_prefix = prefix.into();
        self
    }

    pub fn with_extract_key_regex(mut self, pattern: impl Into<String>) -> Self {
        self.extract_key_regex = Some(pattern.into());
        self
    }

    pub fn with_storage_options(mut self, storage_options: StorageOptions) -> Self {
        self.storage_options = storage_options;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Arguments of the `regionmask` driver: a vector file plus region labels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegionmaskArgs {
    #[serde(flatten)]
    pub file: FileSourceArgs,
    #[serde(default)]
    pub regionmask_kwargs: RegionOptions,
}

impl RegionmaskArgs {
    pub fn new(urlpath: impl Into<String>) -> Self {
        Self {
            file: FileSourceArgs::new(urlpath),
            regionmask_kwargs: RegionOptions::default(),
        }
    }

    pub fn with_file(mut self, file: FileSourceArgs) -> Self {
        self.file = file;
        self
    }

    pub fn with_regionmask_kwargs(mut self, options: RegionOptions) -> Self {
        self.regionmask_kwargs = options;
        self
    }
}
