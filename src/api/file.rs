//! Vector file sources: `geojson`, `shapefile` and the generic
//! `geopandasfile` driver.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use super::options::FileSourceArgs;
use super::schema::Schema;
use super::traits::{check_single_partition, DataSource, SourceState};
use crate::decode::{read_vector, Driver, VectorOptions};
use crate::error::ReaderError;
use crate::frame::GeoFrame;
use crate::resolve::{zip_cache_warning, LegacyCache, Location, Resolver};

/// A vector file read whole into a [`GeoFrame`].
#[derive(Debug)]
pub struct GeoFileSource {
    name: &'static str,
    args: FileSourceArgs,
    driver: Option<Driver>,
    resolver: Resolver,
    warnings: Vec<String>,
    state: SourceState<GeoFrame>,
}

impl GeoFileSource {
    /// Generic file source; the driver comes from `args.driver` or the extension.
    pub fn new(args: FileSourceArgs) -> Result<Self, ReaderError> {
        Self::build("geopandasfile", args, None)
    }

    /// GeoJSON source, unless `args.driver` says otherwise.
    pub fn geojson(args: FileSourceArgs) -> Result<Self, ReaderError> {
        Self::build("geojson", args, Some(Driver::GeoJson))
    }

    /// Shapefile source: a `.shp` path or an archive holding one.
    pub fn shapefile(args: FileSourceArgs) -> Result<Self, ReaderError> {
        Self::build("shapefile", args, Some(Driver::Shapefile))
    }

    fn build(
        name: &'static str,
        args: FileSourceArgs,
        default_driver: Option<Driver>,
    ) -> Result<Self, ReaderError> {
        let driver = match args.driver.as_deref() {
            Some(driver) => Some(Driver::from_name(driver)?),
            None => default_driver,
        };
        let warnings = zip_cache_warning(&args.urlpath, &args.storage_options)
            .into_iter()
            .collect();
        let resolver = Resolver::new(args.storage_options.clone());

        Ok(Self {
            name,
            args,
            driver,
            resolver,
            warnings,
            state: SourceState::Unopened,
        })
    }

    /// Replace the resolver, e.g. to plug in another cache layer or probe.
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_legacy_cache(mut self, cache: Arc<dyn LegacyCache>) -> Self {
        self.resolver = self.resolver.with_legacy_cache(cache);
        self
    }

    pub fn args(&self) -> &FileSourceArgs {
        &self.args
    }

    pub fn driver(&self) -> Option<Driver> {
        self.driver
    }

    /// Warnings raised while constructing the source.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Resolve and decode the file, without touching the source state.
    pub(crate) fn load(&self) -> Result<GeoFrame, ReaderError> {
        load(self.name, &self.args, self.driver, &self.resolver)
    }

    fn loaded(&mut self) -> Result<&GeoFrame, ReaderError> {
        let Self {
            name,
            args,
            driver,
            resolver,
            state,
            ..
        } = self;
        state.get_or_try_open(|| load(name, args, *driver, resolver))
    }
}

fn load(
    name: &str,
    args: &FileSourceArgs,
    driver: Option<Driver>,
    resolver: &Resolver,
) -> Result<GeoFrame, ReaderError> {
    let resolved = resolver.resolve(&args.urlpath);
    let location = Location::parse(&resolved);
    let s3 = args.storage_options.s3_config();
    let options = VectorOptions {
        driver,
        bbox: args.bbox,
        s3: s3.as_ref(),
    };

    let frame = read_vector(&location, &options).map_err(|e| e.in_file(resolved.as_str()))?;
    info!(
        driver = name,
        path = %resolved,
        rows = frame.height(),
        "Opened vector file"
    );
    Ok(frame)
}

impl DataSource for GeoFileSource {
    type Output = GeoFrame;

    fn name(&self) -> &'static str {
        self.name
    }

    fn open(&mut self) -> Result<(), ReaderError> {
        self.loaded().map(|_| ())
    }

    fn is_open(&self) -> bool {
        self.state.is_open()
    }

    fn schema(&mut self) -> Result<Schema, ReaderError> {
        Ok(Schema::from_geoframe(self.loaded()?))
    }

    fn read(&mut self) -> Result<GeoFrame, ReaderError> {
        Ok(self.loaded()?.clone())
    }

    fn read_partition(&mut self, index: usize) -> Result<GeoFrame, ReaderError> {
        check_single_partition(index)?;
        self.read()
    }

    fn close(&mut self) {
        self.state.close();
    }

    fn metadata(&self) -> &Map<String, Value> {
        &self.args.metadata
    }
}
