//! Geometry conversions: every decoder stores geometries as WKT strings.

use geo::{BoundingRect, Intersects};
use geo_types::{Geometry, Rect};
use geozero::wkb::{Ewkb, SpatiaLiteWkb, Wkb};
use geozero::ToGeo;
use serde::Deserialize;
use wkt::ToWkt;

use crate::error::DecodeError;

/// Binary geometry encodings found in databases and parquet files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WkbFlavour {
    /// OGC WKB (GeoParquet, GeoPackage payloads)
    Wkb,
    /// PostGIS extended WKB
    Ewkb,
    /// SpatiaLite BLOB geometry
    SpatiaLite,
}

pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}

/// Decode a binary geometry.
pub fn decode_wkb(bytes: &[u8], flavour: WkbFlavour) -> Result<Geometry<f64>, DecodeError> {
    let decoded = match flavour {
        WkbFlavour::Wkb => Wkb(bytes).to_geo(),
        WkbFlavour::Ewkb => Ewkb(bytes).to_geo(),
        WkbFlavour::SpatiaLite => SpatiaLiteWkb(bytes).to_geo(),
    };
    decoded.map_err(|e| DecodeError::Geometry(format!("{:?} geometry: {}", flavour, e)))
}

/// Decode a binary geometry straight to WKT.
pub fn wkb_to_wkt(bytes: &[u8], flavour: WkbFlavour) -> Result<String, DecodeError> {
    decode_wkb(bytes, flavour).map(|g| to_wkt(&g))
}

/// Bounding-box filter `(minx, miny, maxx, maxy)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f64; 4]")]
pub struct BBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BBox {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    fn rect(&self) -> Rect<f64> {
        Rect::new((self.minx, self.miny), (self.maxx, self.maxy))
    }

    /// Whether the bounding box of `geometry` intersects this box.
    ///
    /// Matches on feature envelopes, so a feature whose envelope touches the
    /// box is kept even if its geometry does not.
    pub fn intersects(&self, geometry: &Geometry<f64>) -> bool {
        match geometry.bounding_rect() {
            Some(envelope) => envelope.intersects(&self.rect()),
            None => false,
        }
    }
}

impl From<[f64; 4]> for BBox {
    fn from([minx, miny, maxx, maxy]: [f64; 4]) -> Self {
        Self::new(minx, miny, maxx, maxy)
    }
}
