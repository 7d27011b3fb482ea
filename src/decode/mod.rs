//! Decoders turning raw bytes, database rows and parquet files into tables.

pub mod archive;
pub mod geojson;
pub mod geometry;
pub mod manifest;
pub mod parquet;
pub mod shapefile;
pub mod sql;

use std::fmt;
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{DecodeError, ReaderError};
use crate::frame::GeoFrame;
use crate::resolve::Location;
use crate::source::{self, S3Config};

pub use archive::{ShapefileParts, VectorArchive};
pub use geometry::{decode_wkb, to_wkt, wkb_to_wkt, BBox, WkbFlavour};
pub use manifest::{KeyPattern, Manifest, ManifestFile, MANIFEST_COLUMNS};
pub use sql::{SqlBackend, SqlQuery, DEFAULT_GEOM_COL};

/// Vector formats understood by the file sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    GeoJson,
    Shapefile,
}

impl Driver {
    /// Parse an OGR-style driver name (`GeoJSON`, `ESRI Shapefile`).
    pub fn from_name(name: &str) -> Result<Self, DecodeError> {
        match name.to_ascii_lowercase().as_str() {
            "geojson" => Ok(Driver::GeoJson),
            "esri shapefile" | "shapefile" => Ok(Driver::Shapefile),
            _ => Err(DecodeError::Driver(format!("Unsupported driver '{}'", name))),
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" | "geojson" => Some(Driver::GeoJson),
            "shp" => Some(Driver::Shapefile),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Driver::GeoJson => "GeoJSON",
            Driver::Shapefile => "ESRI Shapefile",
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            Driver::GeoJson => &["json", "geojson"],
            Driver::Shapefile => &["shp"],
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options shared by the vector file decoders.
#[derive(Debug, Clone, Default)]
pub struct VectorOptions<'a> {
    pub driver: Option<Driver>,
    pub bbox: Option<BBox>,
    pub s3: Option<&'a S3Config>,
}

/// Decode the vector dataset at `location`.
pub fn read_vector(location: &Location, options: &VectorOptions<'_>) -> Result<GeoFrame, ReaderError> {
    let frame = match location {
        Location::Archive { archive, member } => {
            let bytes = fetch(&archive.uri(), options.s3)?;
            let name = archive.file_name().unwrap_or_else(|| archive.uri());
            let mut zip = VectorArchive::new(name, bytes)?;
            let driver = match options.driver {
                Some(driver) => driver,
                None => zip.infer_driver(member.as_deref())?,
            };
            match driver {
                Driver::Shapefile => {
                    let parts = zip.shapefile(member.as_deref())?;
                    shapefile::decode(&parts, options.bbox.as_ref())?
                }
                Driver::GeoJson => {
                    let member = zip
                        .first_member(member.as_deref(), driver.extensions())?
                        .ok_or_else(|| {
                            DecodeError::Driver(format!("No GeoJSON file found in {}", location))
                        })?;
                    let bytes = zip.read_member(&member)?;
                    geojson::decode(&bytes, options.bbox.as_ref())?
                }
            }
        }
        plain => {
            let driver = plain_driver(plain, options.driver)?;
            match driver {
                Driver::GeoJson => {
                    let bytes = fetch(&plain.uri(), options.s3)?;
                    geojson::decode(&bytes, options.bbox.as_ref())?
                }
                Driver::Shapefile => {
                    let parts = fetch_shapefile(plain, options.s3)?;
                    shapefile::decode(&parts, options.bbox.as_ref())?
                }
            }
        }
    };

    info!(
        location = %location,
        rows = frame.height(),
        columns = frame.width(),
        "Decoded vector dataset"
    );
    Ok(frame)
}

/// Driver for a non-archive location.
///
/// A shapefile must be addressed by its `.shp` path; anything else is a
/// driver error, as the sibling files cannot be located.
fn plain_driver(location: &Location, requested: Option<Driver>) -> Result<Driver, DecodeError> {
    let ext = location.extension();
    match requested {
        Some(Driver::Shapefile) if ext.as_deref() != Some("shp") => Err(DecodeError::Driver(format!(
            "'{}' not recognized as a supported file format: {} expects a .shp or .zip path",
            location,
            Driver::Shapefile
        ))),
        Some(driver) => Ok(driver),
        None => ext.as_deref().and_then(Driver::from_extension).ok_or_else(|| {
            DecodeError::Driver(format!(
                "'{}' not recognized as a supported file format",
                location
            ))
        }),
    }
}

fn fetch(uri: &str, s3: Option<&S3Config>) -> Result<Bytes, ReaderError> {
    debug!(uri = %uri, "Fetching dataset");
    Ok(source::block_on(source::fetch(uri, s3))??)
}

/// Fetch `.shp` with its `.dbf` and `.prj` siblings; missing siblings are skipped.
fn fetch_shapefile(location: &Location, s3: Option<&S3Config>) -> Result<ShapefileParts, ReaderError> {
    let uri = location.uri();
    let shp = fetch(&uri, s3)?.to_vec();
    let stem = uri.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(&uri);

    let sibling = |ext: &str| -> Option<Bytes> {
        let candidate = format!("{}.{}", stem, ext);
        match location {
            Location::Local(_) if !Path::new(&candidate).exists() => None,
            _ => match fetch(&candidate, s3) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    debug!(uri = %candidate, error = %e, "Shapefile part not available");
                    None
                }
            },
        }
    };

    Ok(ShapefileParts {
        shp,
        dbf: sibling("dbf").map(|b| b.to_vec()),
        prj: sibling("prj").map(|b| String::from_utf8_lossy(&b).trim().to_string()),
        member: location.file_name().unwrap_or_else(|| uri.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_names() {
        assert_eq!(Driver::from_name("GeoJSON").unwrap(), Driver::GeoJson);
        assert_eq!(Driver::from_name("ESRI Shapefile").unwrap(), Driver::Shapefile);
        assert!(Driver::from_name("GPKG").is_err());
        assert_eq!(Driver::Shapefile.to_string(), "ESRI Shapefile");
    }

    #[test]
    fn test_plain_driver_inference() {
        let geojson = Location::parse("/data/countries.geo.json");
        assert_eq!(plain_driver(&geojson, None).unwrap(), Driver::GeoJson);

        let shp = Location::parse("/data/meow.shp");
        assert_eq!(plain_driver(&shp, Some(Driver::Shapefile)).unwrap(), Driver::Shapefile);

        // Hashed cache file names have no extension
        let hashed = Location::parse("/tmp/cache/0f4c2a9e");
        assert!(plain_driver(&hashed, Some(Driver::Shapefile)).is_err());
        assert!(plain_driver(&hashed, None).is_err());
    }

    #[test]
    fn test_read_local_geojson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.geojson");
        std::fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"v": 1}, "geometry": {"type": "Point", "coordinates": [0, 0]}}
            ]}"#,
        )
        .unwrap();

        let location = Location::parse(&path.display().to_string());
        let frame = read_vector(&location, &VectorOptions::default()).unwrap();
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.dtypes()["v"], "int64");
    }

    #[test]
    fn test_missing_file_is_source_error() {
        let location = Location::parse("/nonexistent/geosource/a.geojson");
        let err = read_vector(&location, &VectorOptions::default()).unwrap_err();
        assert!(matches!(err, ReaderError::Source(_)));
    }
}
