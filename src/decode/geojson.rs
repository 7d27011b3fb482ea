//! GeoJSON decoder.

use geojson::{feature::Id, Feature, GeoJson};
use polars::prelude::{NamedFrom, Series};
use serde_json::Value;

use super::geometry::{to_wkt, BBox};
use crate::error::{DecodeError, ReaderError};
use crate::frame::{CellValue, GeoFrame, TableBuilder, DEFAULT_GEOMETRY_COLUMN};

/// GeoJSON coordinates are always WGS 84 (RFC 7946).
pub const GEOJSON_CRS: &str = "EPSG:4326";

/// Decode a GeoJSON document into a table.
///
/// The feature `id` (when present) comes first, then the properties in
/// first-seen order, then the geometry as WKT. A bare geometry becomes a
/// single feature without properties.
pub fn decode(bytes: &[u8], bbox: Option<&BBox>) -> Result<GeoFrame, ReaderError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| DecodeError::GeoJson(format!("not UTF-8: {}", e)))?;
    let document: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| DecodeError::GeoJson(e.to_string()))?;

    let features = match document {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature {
            geometry: Some(geometry),
            ..Feature::default()
        }],
    };

    let mut table = TableBuilder::new();
    let mut geometries: Vec<Option<String>> = Vec::with_capacity(features.len());

    for feature in features {
        let geometry = feature
            .geometry
            .map(geo_types::Geometry::<f64>::try_from)
            .transpose()
            .map_err(|e| DecodeError::GeoJson(e.to_string()))?;

        if let Some(bbox) = bbox {
            match &geometry {
                Some(g) if bbox.intersects(g) => {}
                _ => continue,
            }
        }

        let mut cells: Vec<(String, CellValue)> = Vec::new();
        if let Some(id) = feature.id {
            let id = match id {
                Id::String(s) => CellValue::Text(s),
                Id::Number(n) => json_cell(Value::Number(n)),
            };
            cells.push(("id".to_string(), id));
        }
        for (key, value) in feature.properties.into_iter().flatten() {
            cells.push((key, json_cell(value)));
        }
        table.push_row(cells);
        geometries.push(geometry.as_ref().map(to_wkt));
    }

    let geometry = Series::new(DEFAULT_GEOMETRY_COLUMN.into(), geometries);
    let frame = table.finish(vec![geometry])?;
    Ok(GeoFrame::new(frame, Some(DEFAULT_GEOMETRY_COLUMN.to_string()))
        .with_crs(Some(GEOJSON_CRS.to_string())))
}

/// Map a JSON property value to a cell; nested values keep their JSON text.
pub(crate) fn json_cell(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::Bool(b) => CellValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Int(i),
            None => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Null),
        },
        Value::String(s) => CellValue::Text(s),
        other => CellValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTRIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": "AFG", "properties": {"name": "Afghanistan"},
             "geometry": {"type": "Polygon", "coordinates": [[[61.2, 35.6], [62.2, 35.2], [63.0, 36.0], [61.2, 35.6]]]}},
            {"type": "Feature", "id": "AGO", "properties": {"name": "Angola"},
             "geometry": {"type": "Point", "coordinates": [17.9, -11.2]}}
        ]
    }"#;

    #[test]
    fn test_decode_feature_collection() {
        let frame = decode(COUNTRIES.as_bytes(), None).unwrap();
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.column_names(), vec!["id", "name", "geometry"]);
        let dtypes = frame.dtypes();
        assert_eq!(dtypes["id"], "object");
        assert_eq!(dtypes["name"], "object");
        assert_eq!(dtypes["geometry"], "geometry");
        assert_eq!(frame.crs(), Some(GEOJSON_CRS));
    }

    #[test]
    fn test_bbox_drops_outside_features() {
        let bbox = BBox::new(60.0, 30.0, 70.0, 40.0);
        let frame = decode(COUNTRIES.as_bytes(), Some(&bbox)).unwrap();
        assert_eq!(frame.height(), 1);
        let ids: Vec<Option<&str>> = frame
            .frame()
            .column("id")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ids, vec![Some("AFG")]);
    }

    #[test]
    fn test_null_geometry_and_mixed_properties() {
        let doc = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"pop": 3, "tags": ["a"]}, "geometry": null},
            {"type": "Feature", "properties": {"pop": 4.5}, "geometry": {"type": "Point", "coordinates": [1, 2]}}
        ]}"#;
        let frame = decode(doc.as_bytes(), None).unwrap();
        assert_eq!(frame.dtypes()["pop"], "float64");
        assert_eq!(frame.dtypes()["tags"], "object");
        let geometries = frame.geometries().unwrap();
        assert!(geometries[0].is_none());
        assert!(geometries[1].is_some());
    }

    #[test]
    fn test_property_named_geometry_is_kept() {
        let doc = r#"{"type": "Feature", "properties": {"geometry": "polygon", "name": "x"},
            "geometry": {"type": "Point", "coordinates": [1, 2]}}"#;
        let frame = decode(doc.as_bytes(), None).unwrap();
        assert_eq!(frame.column_names(), vec!["geometry.1", "name", "geometry"]);
        assert_eq!(frame.geometry_column(), Some("geometry"));
        assert_eq!(frame.dtypes()["geometry.1"], "object");
        assert!(frame.geometries().unwrap()[0].is_some());
    }

    #[test]
    fn test_bare_geometry() {
        let frame = decode(br#"{"type": "Point", "coordinates": [1.0, 2.0]}"#, None).unwrap();
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.column_names(), vec!["geometry"]);
    }

    #[test]
    fn test_malformed_document() {
        let err = decode(b"{\"type\": \"Nope\"}", None).unwrap_err();
        assert!(matches!(err, ReaderError::Decode(DecodeError::GeoJson(_))));
    }
}
