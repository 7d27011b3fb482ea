//! Spatial database sources: `postgis` and `spatialite`.

use serde_json::{Map, Value};
use tracing::debug;

use super::options::SqlSourceArgs;
use super::schema::Schema;
use super::traits::{check_single_partition, DataSource, SourceState};
use crate::decode::{sql::read_sql, SqlBackend, SqlQuery};
use crate::error::ReaderError;
use crate::frame::GeoFrame;

/// The result of one SQL query, loaded into a [`GeoFrame`].
#[derive(Debug)]
pub struct GeoSqlSource {
    backend: SqlBackend,
    args: SqlSourceArgs,
    sql: String,
    state: SourceState<GeoFrame>,
}

impl GeoSqlSource {
    /// Fails without connecting when neither `sql_expr` nor `table` is set.
    pub fn new(backend: SqlBackend, args: SqlSourceArgs) -> Result<Self, ReaderError> {
        let sql = args.query()?;
        debug!(backend = ?backend, sql = %sql, "Prepared SQL source");
        Ok(Self {
            backend,
            args,
            sql,
            state: SourceState::Unopened,
        })
    }

    pub fn postgis(args: SqlSourceArgs) -> Result<Self, ReaderError> {
        Self::new(SqlBackend::PostGis, args)
    }

    pub fn spatialite(args: SqlSourceArgs) -> Result<Self, ReaderError> {
        Self::new(SqlBackend::SpatiaLite, args)
    }

    /// The query sent to the database.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn backend(&self) -> SqlBackend {
        self.backend
    }

    fn loaded(&mut self) -> Result<&GeoFrame, ReaderError> {
        let Self {
            backend,
            args,
            sql,
            state,
        } = self;
        state.get_or_try_open(|| {
            let query = SqlQuery {
                uri: &args.uri,
                sql,
                geom_col: &args.geom_col,
                extension: args.spatialite_extension.as_deref(),
            };
            read_sql(*backend, &query)
        })
    }
}

impl DataSource for GeoSqlSource {
    type Output = GeoFrame;

    fn name(&self) -> &'static str {
        match self.backend {
            SqlBackend::PostGis => "postgis",
            SqlBackend::SpatiaLite => "spatialite",
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_table_and_sql_expr() {
        // Unreachable host: construction must fail before any connection attempt
        let args = SqlSourceArgs::new("postgres://nobody@203.0.113.1:5432/gis");
        let err = GeoSqlSource::postgis(args).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_sql_expr_precedence() {
        let args = SqlSourceArgs::new("postgres://localhost/gis")
            .with_table("countries")
            .with_sql_expr("SELECT * FROM countries LIMIT 1");
        let source = GeoSqlSource::postgis(args).unwrap();
        assert_eq!(source.sql(), "SELECT * FROM countries LIMIT 1");
        assert_eq!(DataSource::name(&source), "postgis");
        assert!(!source.is_open());
    }

    #[test]
    fn test_spatialite_table_read() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("places.sqlite");
        let uri = format!("sqlite:{}?mode=rwc", db.display());

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            use sqlx::Connection;
            let mut conn = sqlx::SqliteConnection::connect(&uri).await.unwrap();
            sqlx::query("CREATE TABLE places (name TEXT, pop INTEGER, geom BLOB)")
                .execute(&mut conn)
                .await
                .unwrap();
            let mut wkb = vec![0x01, 0x01, 0x00, 0x00, 0x00];
            wkb.extend_from_slice(&3.0f64.to_le_bytes());
            wkb.extend_from_slice(&4.0f64.to_le_bytes());
            sqlx::query("INSERT INTO places VALUES ('town', 1200, ?)")
                .bind(wkb)
                .execute(&mut conn)
                .await
                .unwrap();
            conn.close().await.unwrap();
        });

        let mut source = GeoSqlSource::spatialite(SqlSourceArgs::new(uri).with_table("places")).unwrap();
        let schema = source.schema().unwrap();
        assert_eq!(schema.dtype["name"], "object");
        assert_eq!(schema.dtype["pop"], "int64");
        assert_eq!(schema.dtype["geom"], "geometry");

        let frame = source.read().unwrap();
        assert_eq!(frame.height(), 1);
        let geometries = frame.geometries().unwrap();
        assert!(matches!(geometries[0], Some(geo_types::Geometry::Point(_))));
    }
}
