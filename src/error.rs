//! Error types for geospatial data sources

use std::io;
use thiserror::Error;

/// Errors that can occur with byte sources (filesystem, S3, HTTP)
#[derive(Debug, Error)]
pub enum SourceError {
    /// S3 error
    #[error("S3 error: {0}")]
    S3Error(String),
    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(String),
    /// File system error
    #[error("File system error: {0}")]
    FileSystemError(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Path not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
}

/// Errors raised while decoding a dataset into a table
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No decoder understands the input
    #[error("Driver error: {0}")]
    Driver(String),
    /// Malformed GeoJSON
    #[error("Invalid GeoJSON: {0}")]
    GeoJson(String),
    /// Malformed shapefile or dBase table
    #[error("Invalid shapefile: {0}")]
    Shapefile(String),
    /// Archive could not be read or has no usable member
    #[error("Archive error: {0}")]
    Archive(String),
    /// Geometry could not be converted
    #[error("Invalid geometry: {0}")]
    Geometry(String),
    /// Malformed manifest document
    #[error("Invalid manifest: {0}")]
    Manifest(String),
    /// Compressed file could not be inflated
    #[error("Decompression error: {0}")]
    Decompression(String),
}

/// Errors related to table schemas
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Column missing from a table
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    /// Column present but of the wrong type
    #[error("Column '{column}' has type {found}, expected {expected}")]
    WrongType {
        column: String,
        found: String,
        expected: String,
    },
    /// Shards of a partitioned table disagree
    #[error("Incompatible schemas: {0}")]
    IncompatibleSchemas(String),
}

/// Top-level error type returned by data sources
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Source error
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Schema error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Partition index outside the table's partitions
    #[error("Partition {index} out of range: source has {npartitions} partition(s)")]
    PartitionOutOfRange { index: usize, npartitions: usize },

    /// Operation not available for this source
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Error raised by polars
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Error raised by the SQL driver
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Error raised in a specific file, with the file path attached
    #[error("Error in '{path}': {source}")]
    InFile {
        path: String,
        #[source]
        source: Box<ReaderError>,
    },
}

impl ReaderError {
    /// Attach the path of the file that caused this error.
    pub fn in_file(self, path: impl Into<String>) -> Self {
        match self {
            // Keep the innermost path
            ReaderError::InFile { .. } => self,
            other => ReaderError::InFile {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// The error without its file context.
    pub fn root(&self) -> &ReaderError {
        match self {
            ReaderError::InFile { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self.root(), ReaderError::Configuration(_))
    }
}
