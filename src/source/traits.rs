//! `StreamSource` trait shared by local, S3 and HTTP byte sources.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SourceError;

/// Whole-object access to a file, S3 object or HTTP resource.
///
/// Decoders for the formats handled here (GeoJSON, zipped shapefiles,
/// manifest JSON, CSV shards) need the complete payload, so the trait only
/// exposes full reads.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Read the complete object.
    async fn read_all(&self) -> Result<Bytes, SourceError>;

    /// Location string used in errors and log fields.
    fn location(&self) -> String;
}

/// A boxed StreamSource for dynamic dispatch
pub type BoxedSource = Box<dyn StreamSource>;

#[async_trait]
impl StreamSource for BoxedSource {
    async fn read_all(&self) -> Result<Bytes, SourceError> {
        (**self).read_all().await
    }

    fn location(&self) -> String {
        (**self).location()
    }
}
