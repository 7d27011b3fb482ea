//! Named, numbered regions built from a vector table, and the masks they
//! rasterise to.

use std::collections::HashSet;

use geo::Contains;
use geo_types::{Geometry, MultiPolygon, Point};
use polars::prelude::DataType;
use serde::Deserialize;
use tracing::debug;

use crate::error::{DecodeError, ReaderError, SchemaError};
use crate::frame::GeoFrame;

/// Which columns and labels describe the regions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegionOptions {
    /// Column with unique integer region numbers
    pub numbers: Option<String>,
    /// Column with region names
    pub names: Option<String>,
    /// Column with region abbreviations
    pub abbrevs: Option<String>,
    /// Name of the whole region set
    pub name: Option<String>,
    /// Where the regions come from (URL, citation)
    pub source: Option<String>,
}

impl RegionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numbers(mut self, column: impl Into<String>) -> Self {
        self.numbers = Some(column.into());
        self
    }

    pub fn with_names(mut self, column: impl Into<String>) -> Self {
        self.names = Some(column.into());
        self
    }

    pub fn with_abbrevs(mut self, column: impl Into<String>) -> Self {
        self.abbrevs = Some(column.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A set of polygonal regions.
#[derive(Debug, Clone, PartialEq)]
pub struct Regions {
    numbers: Vec<i64>,
    names: Vec<String>,
    abbrevs: Vec<String>,
    name: String,
    source: Option<String>,
    polygons: Vec<MultiPolygon<f64>>,
}

impl Regions {
    /// Build regions from the rows of `frame`.
    ///
    /// Without a numbers column regions are numbered `0..n`; missing names
    /// and abbreviations default to `Region{i}` and `r{i}`.
    pub fn from_geoframe(frame: &GeoFrame, options: &RegionOptions) -> Result<Self, ReaderError> {
        let polygons = frame
            .geometries()?
            .into_iter()
            .enumerate()
            .map(|(row, geometry)| to_multipolygon(row, geometry))
            .collect::<Result<Vec<_>, _>>()?;
        let n = polygons.len();

        let numbers = match &options.numbers {
            Some(column) => int_column(frame, column)?,
            None => (0..n as i64).collect(),
        };
        let mut seen = HashSet::with_capacity(n);
        if let Some(dup) = numbers.iter().find(|number| !seen.insert(**number)) {
            return Err(ReaderError::Configuration(format!(
                "region numbers must be unique, {} appears twice",
                dup
            )));
        }

        let names = match &options.names {
            Some(column) => str_column(frame, column)?,
            None => numbers.iter().map(|i| format!("Region{}", i)).collect(),
        };
        let abbrevs = match &options.abbrevs {
            Some(column) => str_column(frame, column)?,
            None => numbers.iter().map(|i| format!("r{}", i)).collect(),
        };

        debug!(regions = n, "Built regions");
        Ok(Self {
            numbers,
            names,
            abbrevs,
            name: options.name.clone().unwrap_or_else(|| "unnamed".to_string()),
            source: options.source.clone(),
            polygons,
        })
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn numbers(&self) -> &[i64] {
        &self.numbers
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn abbrevs(&self) -> &[String] {
        &self.abbrevs
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn polygons(&self) -> &[MultiPolygon<f64>] {
        &self.polygons
    }

    /// Number of the first region containing `(x, y)`.
    pub fn region_at(&self, x: f64, y: f64) -> Option<i64> {
        let point = Point::new(x, y);
        self.polygons
            .iter()
            .position(|polygon| polygon.contains(&point))
            .map(|idx| self.numbers[idx])
    }

    /// Region numbers on the grid spanned by `lon` and `lat`, row-major by
    /// latitude. Points outside every region are `None`.
    pub fn mask(&self, lon: &[f64], lat: &[f64]) -> Vec<Vec<Option<i64>>> {
        lat.iter()
            .map(|&y| lon.iter().map(|&x| self.region_at(x, y)).collect())
            .collect()
    }
}

fn to_multipolygon(row: usize, geometry: Option<Geometry<f64>>) -> Result<MultiPolygon<f64>, DecodeError> {
    match geometry {
        Some(Geometry::Polygon(polygon)) => Ok(MultiPolygon::new(vec![polygon])),
        Some(Geometry::MultiPolygon(multi)) => Ok(multi),
        Some(other) => Err(DecodeError::Geometry(format!(
            "row {}: regions need polygons, found {}",
            row,
            geometry_kind(&other)
        ))),
        None => Err(DecodeError::Geometry(format!("row {}: missing geometry", row))),
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

fn int_column(frame: &GeoFrame, column: &str) -> Result<Vec<i64>, ReaderError> {
    let series = frame.frame().column(column)?;
    if !series.dtype().is_integer() {
        return Err(SchemaError::WrongType {
            column: column.to_string(),
            found: series.dtype().to_string(),
            expected: "integer".to_string(),
        }
        .into());
    }
    let values = series.cast(&DataType::Int64)?;
    values
        .i64()?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| ReaderError::Configuration(format!("null region number in '{}'", column)))
        })
        .collect()
}

fn str_column(frame: &GeoFrame, column: &str) -> Result<Vec<String>, ReaderError> {
    let values = frame.frame().column(column)?.cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn squares() -> GeoFrame {
        let frame = df! {
            "code" => [10i64, 20],
            "label" => ["west", "east"],
            "abbr" => ["W", "E"],
            "geometry" => [
                "POLYGON((0 0,1 0,1 1,0 1,0 0))",
                "MULTIPOLYGON(((1 0,2 0,2 1,1 1,1 0)))",
            ],
        }
        .unwrap();
        GeoFrame::new(frame, Some("geometry".into()))
    }

    #[test]
    fn test_defaults() {
        let regions = Regions::from_geoframe(&squares(), &RegionOptions::new()).unwrap();
        assert_eq!(regions.numbers(), [0, 1]);
        assert_eq!(regions.names(), ["Region0", "Region1"]);
        assert_eq!(regions.abbrevs(), ["r0", "r1"]);
        assert_eq!(regions.name(), "unnamed");
        assert_eq!(regions.source(), None);
    }

    #[test]
    fn test_columns_and_labels() {
        let options = RegionOptions::new()
            .with_numbers("code")
            .with_names("label")
            .with_abbrevs("abbr")
            .with_name("halves")
            .with_source("unit square");
        let regions = Regions::from_geoframe(&squares(), &options).unwrap();
        assert_eq!(regions.numbers(), [10, 20]);
        assert_eq!(regions.names(), ["west", "east"]);
        assert_eq!(regions.abbrevs(), ["W", "E"]);
        assert_eq!(regions.name(), "halves");
        assert_eq!(regions.source(), Some("unit square"));
    }

    #[test]
    fn test_mask() {
        let options = RegionOptions::new().with_numbers("code");
        let regions = Regions::from_geoframe(&squares(), &options).unwrap();
        let mask = regions.mask(&[0.5, 1.5, 3.0], &[0.5, 5.0]);
        assert_eq!(mask, vec![vec![Some(10), Some(20), None], vec![None, None, None]]);
    }

    #[test]
    fn test_points_are_rejected() {
        let frame = df! { "geometry" => ["POINT(0 0)"] }.unwrap();
        let frame = GeoFrame::new(frame, Some("geometry".into()));
        let err = Regions::from_geoframe(&frame, &RegionOptions::new()).unwrap_err();
        assert!(err.to_string().contains("Point"));
    }

    #[test]
    fn test_duplicate_numbers() {
        let frame = df! {
            "code" => [1i64, 1],
            "geometry" => ["POLYGON((0 0,1 0,1 1,0 0))", "POLYGON((0 0,1 0,1 1,0 0))"],
        }
        .unwrap();
        let frame = GeoFrame::new(frame, Some("geometry".into()));
        let err = Regions::from_geoframe(&frame, &RegionOptions::new().with_numbers("code")).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_numbers_must_be_integers() {
        let options = RegionOptions::new().with_numbers("label");
        assert!(matches!(
            Regions::from_geoframe(&squares(), &options),
            Err(ReaderError::Schema(SchemaError::WrongType { .. }))
        ));
    }
}
