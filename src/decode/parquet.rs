//! GeoParquet: lazy polars scans with WKB geometry converted on collect.

use std::io::Cursor;

use polars::prelude::*;
use tracing::debug;

use super::geometry::{wkb_to_wkt, WkbFlavour};
use crate::error::{DecodeError, ReaderError};
use crate::source::{self, is_http_url, is_s3_uri, S3Config};

/// Lazy scan of one parquet file.
///
/// Local files are scanned in place; remote files are fetched whole first.
pub fn scan_file(uri: &str, s3: Option<&S3Config>) -> Result<LazyFrame, ReaderError> {
    if is_s3_uri(uri) || is_http_url(uri) {
        debug!(uri = %uri, "Fetching remote parquet file");
        let bytes = source::block_on(source::fetch(uri, s3))??;
        let frame = ParquetReader::new(Cursor::new(bytes.to_vec())).finish()?;
        return Ok(frame.lazy());
    }
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    Ok(LazyFrame::scan_parquet(path, ScanArgsParquet::default())?)
}

/// Replace a binary WKB geometry column by WKT strings.
///
/// A geometry column that is already textual is left alone; a missing one
/// is not an error, since projections may drop it.
pub fn geometry_to_wkt(mut frame: DataFrame, geometry_column: &str) -> Result<DataFrame, ReaderError> {
    let Some(idx) = frame.get_column_index(geometry_column) else {
        return Ok(frame);
    };
    let column = &frame.get_columns()[idx];
    if column.dtype() != &DataType::Binary {
        return Ok(frame);
    }

    let wkt: Vec<Option<String>> = column
        .as_materialized_series()
        .binary()?
        .into_iter()
        .map(|wkb| wkb.map(|wkb| wkb_to_wkt(wkb, WkbFlavour::Wkb)).transpose())
        .collect::<Result<_, DecodeError>>()?;

    frame.with_column(Series::new(geometry_column.into(), wkt))?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_wkb(x: f64, y: f64) -> Vec<u8> {
        let mut wkb = vec![0x01, 0x01, 0x00, 0x00, 0x00];
        wkb.extend_from_slice(&x.to_le_bytes());
        wkb.extend_from_slice(&y.to_le_bytes());
        wkb
    }

    fn sample() -> DataFrame {
        let wkb = point_wkb(1.0, 2.0);
        let geometry: Vec<Option<&[u8]>> = vec![Some(wkb.as_slice()), None];
        let name = Series::new("name".into(), ["a", "b"]);
        let geometry = Series::new("geometry".into(), geometry);
        DataFrame::new(vec![name.into_column(), geometry.into_column()]).unwrap()
    }

    #[test]
    fn test_geometry_to_wkt() {
        let frame = geometry_to_wkt(sample(), "geometry").unwrap();
        let values: Vec<Option<&str>> = frame
            .column("geometry")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(values, vec![Some("POINT(1 2)"), None]);
        assert_eq!(frame.get_column_names(), vec!["name", "geometry"]);
    }

    #[test]
    fn test_missing_geometry_column_is_kept() {
        let frame = geometry_to_wkt(sample(), "geom").unwrap();
        assert_eq!(frame.column("geometry").unwrap().dtype(), &DataType::Binary);
    }

    #[test]
    fn test_scan_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.parquet");
        let mut frame = sample();
        let file = std::fs::File::create(&path).unwrap();
        ParquetWriter::new(file).finish(&mut frame).unwrap();

        let lazy = scan_file(&path.display().to_string(), None).unwrap();
        let collected = geometry_to_wkt(lazy.collect().unwrap(), "geometry").unwrap();
        assert_eq!(collected.height(), 2);
        assert_eq!(collected.column("geometry").unwrap().dtype(), &DataType::String);
    }
}
