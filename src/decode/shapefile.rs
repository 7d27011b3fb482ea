//! ESRI shapefile decoder (`.shp` geometries plus `.dbf` attributes).

use std::io::Cursor;

use polars::prelude::{NamedFrom, Series};
use shapefile::dbase::{self, FieldValue};
use shapefile::{Shape, ShapeReader};

use super::archive::ShapefileParts;
use super::geometry::{to_wkt, BBox};
use crate::error::{DecodeError, ReaderError};
use crate::frame::{CellValue, GeoFrame, TableBuilder, DEFAULT_GEOMETRY_COLUMN};

/// Decode shapefile parts into a table.
///
/// Attribute columns keep the `.dbf` field order; a missing `.dbf` yields a
/// geometry-only table. The `.prj` text, when present, is the CRS.
pub fn decode(parts: &ShapefileParts, bbox: Option<&BBox>) -> Result<GeoFrame, ReaderError> {
    let shapes = ShapeReader::new(Cursor::new(parts.shp.as_slice()))
        .and_then(|reader| reader.read())
        .map_err(|e| DecodeError::Shapefile(format!("{}: {}", parts.member, e)))?;

    let (fields, mut records) = match &parts.dbf {
        Some(dbf) => {
            let mut reader = dbase::Reader::new(Cursor::new(dbf.as_slice()))
                .map_err(|e| DecodeError::Shapefile(format!("{}: {}", parts.member, e)))?;
            let fields: Vec<String> = reader
                .fields()
                .iter()
                .map(|field| field.name().to_string())
                .filter(|name| name != "DeletionFlag")
                .collect();
            let records = reader
                .read()
                .map_err(|e| DecodeError::Shapefile(format!("{}: {}", parts.member, e)))?;
            (fields, records.into_iter().map(Some).collect::<Vec<_>>())
        }
        None => (Vec::new(), Vec::new()),
    };

    if !records.is_empty() && records.len() != shapes.len() {
        return Err(DecodeError::Shapefile(format!(
            "{}: {} shapes but {} attribute records",
            parts.member,
            shapes.len(),
            records.len()
        ))
        .into());
    }

    let mut table = TableBuilder::new();
    for field in &fields {
        table.declare(field);
    }
    let mut geometries: Vec<Option<String>> = Vec::with_capacity(shapes.len());

    for (idx, shape) in shapes.into_iter().enumerate() {
        let geometry = shape_to_geometry(shape)?;
        if let Some(bbox) = bbox {
            match &geometry {
                Some(g) if bbox.intersects(g) => {}
                _ => continue,
            }
        }

        let record = records.get_mut(idx).and_then(Option::take);
        let cells: Vec<(&str, CellValue)> = match record {
            Some(record) => fields
                .iter()
                .map(|name| {
                    let value = record.get(name).map(field_cell).unwrap_or(CellValue::Null);
                    (name.as_str(), value)
                })
                .collect(),
            None => Vec::new(),
        };
        table.push_row(cells);
        geometries.push(geometry.as_ref().map(to_wkt));
    }

    let geometry = Series::new(DEFAULT_GEOMETRY_COLUMN.into(), geometries);
    let frame = table.finish(vec![geometry])?;
    Ok(GeoFrame::new(frame, Some(DEFAULT_GEOMETRY_COLUMN.to_string()))
        .with_crs(parts.prj.clone()))
}

fn shape_to_geometry(shape: Shape) -> Result<Option<geo_types::Geometry<f64>>, DecodeError> {
    if matches!(shape, Shape::NullShape) {
        return Ok(None);
    }
    geo_types::Geometry::<f64>::try_from(shape)
        .map(Some)
        .map_err(|e| DecodeError::Geometry(e.to_string()))
}

fn field_cell(value: &FieldValue) -> CellValue {
    match value {
        FieldValue::Character(Some(s)) => CellValue::Text(s.trim_end().to_string()),
        FieldValue::Memo(s) => CellValue::Text(s.clone()),
        FieldValue::Numeric(Some(n)) => numeric_cell(*n),
        FieldValue::Float(Some(f)) => numeric_cell(f64::from(*f)),
        FieldValue::Double(d) => CellValue::Float(*d),
        FieldValue::Currency(c) => CellValue::Float(*c),
        FieldValue::Integer(i) => CellValue::Int(i64::from(*i)),
        FieldValue::Logical(Some(b)) => CellValue::Bool(*b),
        FieldValue::Date(Some(d)) => {
            CellValue::Text(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
        }
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Float(None)
        | FieldValue::Logical(None)
        | FieldValue::Date(None) => CellValue::Null,
        #[allow(unreachable_patterns)]
        other => CellValue::Text(format!("{:?}", other)),
    }
}

/// dBase numerics are floats; integral values become integers.
fn numeric_cell(n: f64) -> CellValue {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        CellValue::Int(n as i64)
    } else {
        CellValue::Float(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_cell() {
        assert_eq!(numeric_cell(3.0), CellValue::Int(3));
        assert_eq!(numeric_cell(3.5), CellValue::Float(3.5));
    }

    #[test]
    fn test_field_cell_trims_character_padding() {
        assert_eq!(
            field_cell(&FieldValue::Character(Some("Atlantic   ".into()))),
            CellValue::Text("Atlantic".into())
        );
        assert_eq!(field_cell(&FieldValue::Logical(None)), CellValue::Null);
        assert_eq!(field_cell(&FieldValue::Integer(7)), CellValue::Int(7));
    }

    #[test]
    fn test_garbage_shp_fails() {
        let parts = ShapefileParts {
            shp: b"definitely not a shapefile".to_vec(),
            dbf: None,
            prj: None,
            member: "bad.shp".into(),
        };
        let err = decode(&parts, None).unwrap_err();
        assert!(matches!(err, ReaderError::Decode(DecodeError::Shapefile(_))));
    }
}
