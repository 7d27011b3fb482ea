//! SQL decoders: PostGIS through `sqlx::postgres`, SpatiaLite through
//! `sqlx::sqlite`.
//!
//! Rows are read in full. The geometry column is decoded from its binary
//! form (EWKB for PostGIS, SpatiaLite BLOB or WKB for SQLite) and stored as
//! WKT in place, so the table keeps the query's column order.
//!
//! Columns of any other type (`numeric`, `uuid`, `json`, `interval`, ...)
//! are read as text: PostGIS queries are wrapped to cast them server side,
//! SQLite values are read through their text form.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, Statement, TypeInfo, ValueRef};
use tracing::{debug, info};

use super::geometry::{decode_wkb, to_wkt, WkbFlavour};
use crate::error::{DecodeError, ReaderError, SchemaError};
use crate::frame::{CellValue, GeoFrame, TableBuilder};
use crate::source::block_on;

/// Default name of the geometry column in SQL results.
pub const DEFAULT_GEOM_COL: &str = "geom";

/// Database flavours served by the SQL sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlBackend {
    PostGis,
    SpatiaLite,
}

/// A query against a spatial database.
#[derive(Debug, Clone)]
pub struct SqlQuery<'a> {
    pub uri: &'a str,
    pub sql: &'a str,
    pub geom_col: &'a str,
    /// SQLite extension to load before querying (e.g. `mod_spatialite`)
    pub extension: Option<&'a str>,
}

/// Run `query` and decode its rows.
pub fn read_sql(backend: SqlBackend, query: &SqlQuery<'_>) -> Result<GeoFrame, ReaderError> {
    let frame = match backend {
        SqlBackend::PostGis => block_on(read_postgis(query))??,
        SqlBackend::SpatiaLite => block_on(read_spatialite(query))??,
    };
    info!(
        backend = ?backend,
        rows = frame.height(),
        columns = frame.width(),
        "Loaded SQL result"
    );
    Ok(frame)
}

/// How the values of a Postgres column are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Text,
    Date,
    Timestamp,
    TimestampTz,
    Bytes,
    Geometry,
    /// No native reading; cast to `text` by the database
    Other,
}

/// Map a Postgres type name to the way its values are read.
pub fn pg_kind(type_name: &str) -> PgKind {
    match type_name.to_ascii_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => PgKind::Bool,
        "INT2" | "SMALLINT" => PgKind::Int2,
        "INT4" | "INT" | "INTEGER" => PgKind::Int4,
        "INT8" | "BIGINT" => PgKind::Int8,
        "FLOAT4" | "REAL" => PgKind::Float4,
        "FLOAT8" | "DOUBLE PRECISION" => PgKind::Float8,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHARACTER VARYING" | "CHARACTER" | "CITEXT" => {
            PgKind::Text
        }
        "DATE" => PgKind::Date,
        "TIMESTAMP" => PgKind::Timestamp,
        "TIMESTAMPTZ" => PgKind::TimestampTz,
        "BYTEA" => PgKind::Bytes,
        "GEOMETRY" | "GEOGRAPHY" => PgKind::Geometry,
        _ => PgKind::Other,
    }
}

/// Wrap `sql` so every `Other` column except the geometry comes back as
/// `text`; `None` when nothing needs casting.
///
/// The subquery's columns are renamed positionally, so duplicate names in
/// the original query stay addressable, then aliased back.
pub fn text_cast_query(
    sql: &str,
    columns: &[(String, String)],
    kinds: &[PgKind],
    geom_idx: usize,
) -> Option<String> {
    let cast = |idx: usize| kinds[idx] == PgKind::Other && idx != geom_idx;
    if !(0..columns.len()).any(cast) {
        return None;
    }
    let select: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(idx, (name, _))| {
            let suffix = if cast(idx) { "::text" } else { "" };
            format!("q.c{}{} AS {}", idx, suffix, quote_ident(name))
        })
        .collect();
    let aliases: Vec<String> = (0..columns.len()).map(|idx| format!("c{}", idx)).collect();
    Some(format!(
        "SELECT {} FROM ({}) AS q({})",
        select.join(", "),
        sql.trim().trim_end_matches(';'),
        aliases.join(", ")
    ))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

async fn read_postgis(query: &SqlQuery<'_>) -> Result<GeoFrame, ReaderError> {
    debug!(sql = %query.sql, "Connecting to PostGIS");
    let mut conn = PgConnection::connect(query.uri).await?;

    let statement = (&mut conn).prepare(query.sql).await?;
    let columns: Vec<(String, String)> = statement
        .columns()
        .iter()
        .map(|col| (col.name().to_string(), col.type_info().name().to_string()))
        .collect();
    let kinds: Vec<PgKind> = columns.iter().map(|(_, type_name)| pg_kind(type_name)).collect();
    let geom_idx = geometry_index(&columns, query.geom_col)?;

    let rows = match text_cast_query(query.sql, &columns, &kinds, geom_idx) {
        Some(sql) => {
            let cast: Vec<String> = columns
                .iter()
                .zip(&kinds)
                .filter(|(_, kind)| **kind == PgKind::Other)
                .map(|((name, type_name), _)| format!("{}: {}", name, type_name))
                .collect();
            debug!(columns = ?cast, "Reading columns as text");
            sqlx::query(&sql).fetch_all(&mut conn).await?
        }
        None => sqlx::query(query.sql).fetch_all(&mut conn).await?,
    };
    conn.close().await?;

    let mut table = TableBuilder::new();
    for (name, _) in &columns {
        table.declare(name);
    }
    let mut srid = None;

    for row in &rows {
        let mut cells = Vec::with_capacity(columns.len());
        for (idx, ((name, _), kind)) in columns.iter().zip(&kinds).enumerate() {
            let value = if idx == geom_idx {
                let bytes: Option<Vec<u8>> = row.try_get_unchecked(idx)?;
                if srid.is_none() {
                    srid = bytes.as_deref().and_then(ewkb_srid);
                }
                geometry_cell(bytes.as_deref(), WkbFlavour::Ewkb)?
            } else {
                pg_cell(row, idx, *kind)?
            };
            cells.push((name.as_str(), value));
        }
        table.push_row(cells);
    }

    let frame = table.finish(Vec::new())?;
    Ok(GeoFrame::new(frame, Some(columns[geom_idx].0.clone()))
        .with_crs(srid.map(|srid| format!("EPSG:{}", srid))))
}

fn pg_cell(row: &PgRow, idx: usize, kind: PgKind) -> Result<CellValue, ReaderError> {
    let cell = match kind {
        PgKind::Bool => row.try_get::<Option<bool>, _>(idx)?.map(CellValue::Bool),
        PgKind::Int2 => row
            .try_get::<Option<i16>, _>(idx)?
            .map(|v| CellValue::Int(i64::from(v))),
        PgKind::Int4 => row
            .try_get::<Option<i32>, _>(idx)?
            .map(|v| CellValue::Int(i64::from(v))),
        PgKind::Int8 => row.try_get::<Option<i64>, _>(idx)?.map(CellValue::Int),
        PgKind::Float4 => row
            .try_get::<Option<f32>, _>(idx)?
            .map(|v| CellValue::Float(f64::from(v))),
        PgKind::Float8 => row.try_get::<Option<f64>, _>(idx)?.map(CellValue::Float),
        PgKind::Text | PgKind::Other => row.try_get::<Option<String>, _>(idx)?.map(CellValue::Text),
        PgKind::Date => row
            .try_get::<Option<NaiveDate>, _>(idx)?
            .map(|d| CellValue::Text(d.to_string())),
        PgKind::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(|ts| CellValue::Text(ts.to_string())),
        PgKind::TimestampTz => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|ts| CellValue::Text(ts.to_rfc3339())),
        PgKind::Bytes => row
            .try_get::<Option<Vec<u8>>, _>(idx)?
            .map(|b| CellValue::Text(hex(&b))),
        // Secondary geometry columns are kept as WKT too
        PgKind::Geometry => {
            let bytes: Option<Vec<u8>> = row.try_get_unchecked(idx)?;
            return Ok(geometry_cell(bytes.as_deref(), WkbFlavour::Ewkb)?);
        }
    };
    Ok(cell.unwrap_or(CellValue::Null))
}

async fn read_spatialite(query: &SqlQuery<'_>) -> Result<GeoFrame, ReaderError> {
    let mut options = if query.uri.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(query.uri)?
    } else {
        SqliteConnectOptions::new().filename(query.uri)
    };
    if let Some(extension) = query.extension {
        options = options.extension(extension.to_string());
    }

    debug!(uri = %query.uri, sql = %query.sql, "Connecting to SQLite");
    let mut conn: SqliteConnection = options.connect().await?;

    let statement = (&mut conn).prepare(query.sql).await?;
    let columns: Vec<(String, String)> = statement
        .columns()
        .iter()
        .map(|col| (col.name().to_string(), col.type_info().name().to_string()))
        .collect();
    let geom_idx = geometry_index(&columns, query.geom_col)?;

    let rows = sqlx::query(query.sql).fetch_all(&mut conn).await?;
    conn.close().await?;

    let mut table = TableBuilder::new();
    for (name, _) in &columns {
        table.declare(name);
    }

    for row in &rows {
        let mut cells = Vec::with_capacity(columns.len());
        for (idx, (name, _)) in columns.iter().enumerate() {
            let value = sqlite_cell(row, idx, idx == geom_idx)?;
            cells.push((name.as_str(), value));
        }
        table.push_row(cells);
    }

    let frame = table.finish(Vec::new())?;
    Ok(GeoFrame::new(frame, Some(columns[geom_idx].0.clone())))
}

/// SQLite values carry their own storage class, so the type is read per value.
fn sqlite_cell(row: &SqliteRow, idx: usize, is_geometry: bool) -> Result<CellValue, ReaderError> {
    let storage = {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(CellValue::Null);
        }
        raw.type_info().name().to_ascii_uppercase()
    };

    let cell = match storage.as_str() {
        "INTEGER" | "INT" | "BIGINT" => CellValue::Int(row.try_get_unchecked::<i64, _>(idx)?),
        "BOOLEAN" => CellValue::Bool(row.try_get_unchecked::<bool, _>(idx)?),
        "REAL" | "NUMERIC" | "FLOAT" | "DOUBLE" => {
            CellValue::Float(row.try_get_unchecked::<f64, _>(idx)?)
        }
        "TEXT" | "DATE" | "TIME" | "DATETIME" => {
            CellValue::Text(row.try_get_unchecked::<String, _>(idx)?)
        }
        "BLOB" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(idx)?;
            if is_geometry {
                return Ok(spatialite_geometry(&bytes)?);
            }
            CellValue::Text(hex(&bytes))
        }
        other => {
            debug!(column = %row.columns()[idx].name(), type_name = other, "Reading value as text");
            match row.try_get_unchecked::<String, _>(idx) {
                Ok(text) => CellValue::Text(text),
                Err(_) => CellValue::Text(hex(&row.try_get_unchecked::<Vec<u8>, _>(idx)?)),
            }
        }
    };
    Ok(cell)
}

/// SpatiaLite BLOBs start with 0x00 and end with 0xFE; GeoPackage-less
/// tables often hold plain WKB instead.
fn spatialite_geometry(bytes: &[u8]) -> Result<CellValue, DecodeError> {
    let is_spatialite = bytes.first() == Some(&0x00) && bytes.last() == Some(&0xFE);
    let flavour = if is_spatialite {
        WkbFlavour::SpatiaLite
    } else {
        WkbFlavour::Wkb
    };
    geometry_cell(Some(bytes), flavour)
}

fn geometry_cell(bytes: Option<&[u8]>, flavour: WkbFlavour) -> Result<CellValue, DecodeError> {
    match bytes {
        None => Ok(CellValue::Null),
        Some(bytes) => decode_wkb(bytes, flavour).map(|g| CellValue::Text(to_wkt(&g))),
    }
}

fn geometry_index(columns: &[(String, String)], geom_col: &str) -> Result<usize, SchemaError> {
    columns
        .iter()
        .position(|(name, _)| name == geom_col)
        .ok_or_else(|| SchemaError::ColumnNotFound(geom_col.to_string()))
}

/// SRID embedded in an EWKB header, if flagged.
pub fn ewkb_srid(bytes: &[u8]) -> Option<u32> {
    const SRID_FLAG: u32 = 0x2000_0000;
    let read_u32 = |slice: &[u8]| -> Option<u32> {
        let arr: [u8; 4] = slice.try_into().ok()?;
        Some(match bytes.first()? {
            0 => u32::from_be_bytes(arr),
            _ => u32::from_le_bytes(arr),
        })
    };
    let geometry_type = read_u32(bytes.get(1..5)?)?;
    if geometry_type & SRID_FLAG == 0 {
        return None;
    }
    read_u32(bytes.get(5..9)?).filter(|srid| *srid != 0)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(name, type_name)| (name.to_string(), type_name.to_string()))
            .collect()
    }

    #[test]
    fn test_pg_kind_known_types() {
        assert_eq!(pg_kind("int4"), PgKind::Int4);
        assert_eq!(pg_kind("INT8"), PgKind::Int8);
        assert_eq!(pg_kind("varchar"), PgKind::Text);
        assert_eq!(pg_kind("bpchar"), PgKind::Text);
        assert_eq!(pg_kind("float8"), PgKind::Float8);
        assert_eq!(pg_kind("timestamptz"), PgKind::TimestampTz);
        assert_eq!(pg_kind("geometry"), PgKind::Geometry);
    }

    #[test]
    fn test_pg_kind_falls_back_to_text() {
        for type_name in ["numeric", "NUMERIC", "uuid", "json", "jsonb", "interval", "time", "tsvector"] {
            assert_eq!(pg_kind(type_name), PgKind::Other, "{}", type_name);
        }
    }

    #[test]
    fn test_text_cast_query_numeric_and_uuid() {
        let columns = columns(&[
            ("id", "UUID"),
            ("area", "NUMERIC"),
            ("name", "TEXT"),
            ("geom", "geometry"),
        ]);
        let kinds: Vec<PgKind> = columns.iter().map(|(_, t)| pg_kind(t)).collect();
        let sql = text_cast_query("SELECT * FROM parcels;", &columns, &kinds, 3).unwrap();
        assert_eq!(
            sql,
            "SELECT q.c0::text AS \"id\", q.c1::text AS \"area\", q.c2 AS \"name\", q.c3 AS \"geom\" \
             FROM (SELECT * FROM parcels) AS q(c0, c1, c2, c3)"
        );
    }

    #[test]
    fn test_text_cast_query_leaves_native_columns_and_geometry() {
        let native = columns(&[("id", "INT4"), ("geom", "geometry")]);
        let kinds: Vec<PgKind> = native.iter().map(|(_, t)| pg_kind(t)).collect();
        assert_eq!(text_cast_query("SELECT 1", &native, &kinds, 1), None);

        // An exotic geometry column is decoded, never cast
        let boxed = columns(&[("id", "INT4"), ("geom", "box2d")]);
        let kinds: Vec<PgKind> = boxed.iter().map(|(_, t)| pg_kind(t)).collect();
        assert_eq!(text_cast_query("SELECT 1", &boxed, &kinds, 1), None);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Key"), "\"Key\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_spatialite_custom_types_read_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parcels.sqlite");
        let uri = format!("sqlite:{}?mode=rwc", path.display());
        block_on(async {
            let mut conn = SqliteConnection::connect(&uri).await.unwrap();
            conn.execute(
                "CREATE TABLE parcels (id UUID, area NUMERIC, tags JSON, geom BLOB);
                 INSERT INTO parcels VALUES
                     ('550e8400-e29b-41d4-a716-446655440000', '12.50', '{\"a\": 1}', X'0101000000000000000000F03F0000000000000040');",
            )
            .await
            .unwrap();
            conn.close().await.unwrap();
        })
        .unwrap();

        let frame = read_sql(
            SqlBackend::SpatiaLite,
            &SqlQuery {
                uri: &path.display().to_string(),
                sql: "SELECT id, area, tags, geom FROM parcels",
                geom_col: "geom",
                extension: None,
            },
        )
        .unwrap();
        assert_eq!(frame.height(), 1);
        let id = frame.frame().column("id").unwrap().str().unwrap().get(0).map(str::to_string);
        assert_eq!(id.as_deref(), Some("550e8400-e29b-41d4-a716-446655440000"));
        let tags = frame.frame().column("tags").unwrap().str().unwrap().get(0).map(str::to_string);
        assert_eq!(tags.as_deref(), Some("{\"a\": 1}"));
        assert!(frame.frame().column("area").is_ok());
    }

    #[test]
    fn test_ewkb_srid() {
        // POINT(1 2) with SRID 4326, little endian
        let mut ewkb = vec![0x01, 0x01, 0x00, 0x00, 0x20, 0xe6, 0x10, 0x00, 0x00];
        ewkb.extend_from_slice(&1.0f64.to_le_bytes());
        ewkb.extend_from_slice(&2.0f64.to_le_bytes());
        assert_eq!(ewkb_srid(&ewkb), Some(4326));
        assert_eq!(
            geometry_cell(Some(&ewkb), WkbFlavour::Ewkb).unwrap(),
            CellValue::Text("POINT(1 2)".into())
        );

        // Plain WKB has no SRID
        let mut wkb = vec![0x01, 0x01, 0x00, 0x00, 0x00];
        wkb.extend_from_slice(&1.0f64.to_le_bytes());
        wkb.extend_from_slice(&2.0f64.to_le_bytes());
        assert_eq!(ewkb_srid(&wkb), None);
        assert_eq!(ewkb_srid(&[0x01]), None);
    }

    #[test]
    fn test_geometry_index() {
        let columns = vec![
            ("id".to_string(), "INT4".to_string()),
            ("geom".to_string(), "geometry".to_string()),
        ];
        assert_eq!(geometry_index(&columns, "geom").unwrap(), 1);
        assert!(geometry_index(&columns, "the_geom").is_err());
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x00, 0xab, 0x10]), "00ab10");
    }
}
