//! Driver names the host refers to in its catalogs.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::file::GeoFileSource;
use super::manifest::S3ManifestSource;
use super::parquet::GeoParquetSource;
use super::regionmask::RegionmaskSource;
use super::sql::GeoSqlSource;
use super::traits::DynSource;
use crate::error::ReaderError;

/// Builds a source from its JSON arguments.
pub type SourceConstructor = fn(Value) -> Result<Box<dyn DynSource>, ReaderError>;

/// Map of driver name to constructor.
#[derive(Debug, Clone)]
pub struct Registry {
    drivers: BTreeMap<&'static str, SourceConstructor>,
}

impl Default for Registry {
    /// Every driver this crate provides.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("geojson", geojson);
        registry.register("shapefile", shapefile);
        registry.register("geopandasfile", geopandasfile);
        registry.register("postgis", postgis);
        registry.register("spatialite", spatialite);
        registry.register("geoparquet", geoparquet);
        registry.register("s3-manifest", s3_manifest);
        registry.register("regionmask", regionmask);
        registry
    }
}

fn geojson(args: Value) -> Result<Box<dyn DynSource>, ReaderError> {
    Ok(Box::new(GeoFileSource::geojson(parse_args(args)?)?))
}

fn shapefile(args: Value) -> Result<Box<dyn DynSource>, ReaderError> {
    Ok(Box::new(GeoFileSource::shapefile(parse_args(args)?)?))
}

fn geopandasfile(args: Value) -> Result<Box<dyn DynSource>, ReaderError> {
    Ok(Box::new(GeoFileSource::new(parse_args(args)?)?))
}

fn postgis(args: Value) -> Result<Box<dyn DynSource>, ReaderError> {
    Ok(Box::new(GeoSqlSource::postgis(parse_args(args)?)?))
}

fn spatialite(args: Value) -> Result<Box<dyn DynSource>, ReaderError> {
    Ok(Box::new(GeoSqlSource::spatialite(parse_args(args)?)?))
}

fn geoparquet(args: Value) -> Result<Box<dyn DynSource>, ReaderError> {
    Ok(Box::new(GeoParquetSource::new(parse_args(args)?)))
}

fn s3_manifest(args: Value) -> Result<Box<dyn DynSource>, ReaderError> {
    Ok(Box::new(S3ManifestSource::new(parse_args(args)?)?))
}

fn regionmask(args: Value) -> Result<Box<dyn DynSource>, ReaderError> {
    Ok(Box::new(RegionmaskSource::new(parse_args(args)?)?))
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            drivers: BTreeMap::new(),
        }
    }

    /// Add or replace a driver.
    pub fn register(&mut self, name: &'static str, constructor: SourceConstructor) {
        self.drivers.insert(name, constructor);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.drivers.keys().copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Construct the `driver` source from host arguments.
    pub fn create(&self, driver: &str, args: Value) -> Result<Box<dyn DynSource>, ReaderError> {
        let constructor = self.drivers.get(driver).ok_or_else(|| {
            ReaderError::Configuration(format!(
                "Unknown driver '{}'; available: {}",
                driver,
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })?;
        constructor(args)
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ReaderError> {
    serde_json::from_value(args)
        .map_err(|e| ReaderError::Configuration(format!("Invalid arguments: {}", e)))
}
