//! `regionmask`: a vector file turned into [`Regions`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::info;

use super::file::GeoFileSource;
use super::options::RegionmaskArgs;
use super::schema::Schema;
use super::traits::{check_single_partition, DataSource, SourceState};
use crate::error::ReaderError;
use crate::regions::{RegionOptions, Regions};

#[derive(Debug, Clone)]
struct LoadedRegions {
    /// dtypes of the vector table the regions were built from
    dtypes: BTreeMap<String, String>,
    regions: Regions,
}

/// Regions read from a vector file.
///
/// The schema reports the vector table's columns, since regions have no
/// tabular dtypes of their own.
#[derive(Debug)]
pub struct RegionmaskSource {
    file: GeoFileSource,
    options: RegionOptions,
    state: SourceState<LoadedRegions>,
}

impl RegionmaskSource {
    pub fn new(args: RegionmaskArgs) -> Result<Self, ReaderError> {
        Ok(Self {
            file: GeoFileSource::new(args.file)?,
            options: args.regionmask_kwargs,
            state: SourceState::Unopened,
        })
    }

    /// Wrap an already configured file source.
    pub fn from_file_source(file: GeoFileSource, options: RegionOptions) -> Self {
        Self {
            file,
            options,
            state: SourceState::Unopened,
        }
    }

    pub fn warnings(&self) -> &[String] {
        self.file.warnings()
    }

    fn loaded(&mut self) -> Result<&LoadedRegions, ReaderError> {
        let Self {
            file,
            options,
            state,
        } = self;
        state.get_or_try_open(|| load(file, options))
    }
}

#[cfg(feature = "regionmask")]
fn load(file: &GeoFileSource, options: &RegionOptions) -> Result<LoadedRegions, ReaderError> {
    let frame = file.load()?;
    let dtypes = frame.dtypes();
    let regions = Regions::from_geoframe(&frame, options)?;
    info!(regions = regions.len(), name = %regions.name(), "Opened regions");
    Ok(LoadedRegions { dtypes, regions })
}

#[cfg(not(feature = "regionmask"))]
fn load(_file: &GeoFileSource, _options: &RegionOptions) -> Result<LoadedRegions, ReaderError> {
    info!("Region masks are not compiled in");
    Err(ReaderError::Configuration(
        "regionmask must be installed (enable the `regionmask` feature)".to_string(),
    ))
}

impl DataSource for RegionmaskSource {
    type Output = Regions;

    fn name(&self) -> &'static str {
        "regionmask"
    }

    fn open(&mut self) -> Result<(), ReaderError> {
        self.loaded().map(|_| ())
    }

    fn is_open(&self) -> bool {
        self.state.is_open()
    }

    fn schema(&mut self) -> Result<Schema, ReaderError> {
        Ok(Schema::new(self.loaded()?.dtypes.clone(), None, 1))
    }

    fn read(&mut self) -> Result<Regions, ReaderError> {
        Ok(self.loaded()?.regions.clone())
    }

    fn read_partition(&mut self, index: usize) -> Result<Regions, ReaderError> {
        check_single_partition(index)?;
        self.read()
    }

    fn close(&mut self) {
        self.state.close();
    }

    fn metadata(&self) -> &Map<String, Value> {
        DataSource::metadata(&self.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALVES: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"NAME": "West", "ABBREV": "W"},
         "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
        {"type": "Feature", "properties": {"NAME": "East", "ABBREV": "E"},
         "geometry": {"type": "Polygon", "coordinates": [[[1,0],[2,0],[2,1],[1,1],[1,0]]]}}
    ]}"#;

    #[cfg(feature = "regionmask")]
    #[test]
    fn test_regions_keep_vector_dtypes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("halves.geojson");
        std::fs::write(&path, HALVES).unwrap();

        let args = RegionmaskArgs::new(path.display().to_string()).with_regionmask_kwargs(
            RegionOptions::new().with_names("NAME").with_abbrevs("ABBREV").with_name("halves"),
        );
        let mut source = RegionmaskSource::new(args).unwrap();

        let schema = source.schema().unwrap();
        assert_eq!(schema.dtype["NAME"], "object");
        assert_eq!(schema.dtype["geometry"], "geometry");

        let regions = source.read().unwrap();
        assert_eq!(regions.names(), ["West", "East"]);
        assert_eq!(regions.abbrevs(), ["W", "E"]);
        assert_eq!(regions.region_at(1.5, 0.5), Some(1));
    }

    #[cfg(not(feature = "regionmask"))]
    #[test]
    fn test_missing_feature_fails_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("halves.geojson");
        std::fs::write(&path, HALVES).unwrap();

        let mut source = RegionmaskSource::new(RegionmaskArgs::new(path.display().to_string())).unwrap();
        let err = source.open().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("regionmask must be installed"));
    }
}
