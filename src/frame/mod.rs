//! In-memory tables produced by the decoders.

mod builder;
mod dtype;

use std::collections::BTreeMap;

use geo_types::Geometry;
use polars::prelude::{DataFrame, DataType};
use wkt::TryFromWkt;

use crate::error::{DecodeError, ReaderError, SchemaError};

pub use builder::{unique_name, CellValue, TableBuilder};
pub use dtype::{dtype_name, GEOMETRY_DTYPE};

/// Default name of the geometry column.
pub const DEFAULT_GEOMETRY_COLUMN: &str = "geometry";

/// A polars table with one column holding geometries as WKT strings.
#[derive(Debug, Clone)]
pub struct GeoFrame {
    frame: DataFrame,
    geometry_column: Option<String>,
    crs: Option<String>,
}

impl GeoFrame {
    /// Wrap `frame`, marking `geometry_column` as the geometry column.
    pub fn new(frame: DataFrame, geometry_column: Option<String>) -> Self {
        Self {
            frame,
            geometry_column,
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: Option<String>) -> Self {
        self.crs = crs;
        self
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn geometry_column(&self) -> Option<&str> {
        self.geometry_column.as_deref()
    }

    /// Coordinate reference system, as found in the source (EPSG code or WKT).
    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Column name to host dtype name; the geometry column reports `geometry`.
    pub fn dtypes(&self) -> BTreeMap<String, String> {
        frame_dtypes(&self.frame, self.geometry_column.as_deref())
    }

    /// Parse the geometry column back into `geo_types` geometries.
    pub fn geometries(&self) -> Result<Vec<Option<Geometry<f64>>>, ReaderError> {
        let column = self.geometry_column.as_deref().ok_or_else(|| {
            SchemaError::ColumnNotFound(DEFAULT_GEOMETRY_COLUMN.to_string())
        })?;
        let series = self.frame.column(column)?;
        if series.dtype() != &DataType::String {
            return Err(SchemaError::WrongType {
                column: column.to_string(),
                found: series.dtype().to_string(),
                expected: "str (WKT)".to_string(),
            }
            .into());
        }

        series
            .str()?
            .into_iter()
            .map(|wkt| {
                wkt.map(|wkt| {
                    Geometry::<f64>::try_from_wkt_str(wkt)
                        .map_err(|e| {
                            ReaderError::from(DecodeError::Geometry(format!("{}: {}", wkt, e)))
                        })
                })
                .transpose()
            })
            .collect()
    }
}

/// Dtype names of every column of `frame`.
pub fn frame_dtypes(frame: &DataFrame, geometry_column: Option<&str>) -> BTreeMap<String, String> {
    frame
        .get_columns()
        .iter()
        .map(|column| {
            let name = column.name().to_string();
            let dtype = if Some(name.as_str()) == geometry_column {
                GEOMETRY_DTYPE.to_string()
            } else {
                dtype_name(column.dtype())
            };
            (name, dtype)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn sample() -> GeoFrame {
        let frame = df! {
            "name" => ["a", "b"],
            "geometry" => ["POINT(1 2)", "POINT(3 4)"],
        }
        .unwrap();
        GeoFrame::new(frame, Some("geometry".to_string()))
    }

    #[test]
    fn test_dtypes_report_geometry() {
        let dtypes = sample().dtypes();
        assert_eq!(dtypes["name"], "object");
        assert_eq!(dtypes["geometry"], "geometry");
    }

    #[test]
    fn test_geometries_parse_wkt() {
        let geometries = sample().geometries().unwrap();
        assert_eq!(geometries.len(), 2);
        match &geometries[1] {
            Some(Geometry::Point(p)) => assert_eq!((p.x(), p.y()), (3.0, 4.0)),
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn test_geometries_without_column() {
        let frame = df! { "a" => [1i64] }.unwrap();
        let geo = GeoFrame::new(frame, None);
        assert!(geo.geometries().is_err());
    }
}
