use crate::model::Radio;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use time::OffsetDateTime;

pub enum Columns {
    Radio,
    Mcc,
    Mnc,
    Lac,
    Cid,
    Lat,
    Lon,
    MaxLat,
    MinLat,
    MaxLon,
    MinLon,
    Radius,
    Samples,
    CreatedAt,
    ModifiedAt,
}

impl Columns {
    pub fn as_str(&self) -> &'static str {
        match self {
            Columns::Radio => "radio",
            Columns::Mcc => "mcc",
            Columns::Mnc => "mnc",
            Columns::Lac => "lac",
            Columns::Cid => "cid",
            Columns::Lat => "lat",
            Columns::Lon => "lon",
            Columns::MaxLat => "max_lat",
            Columns::MinLat => "min_lat",
            Columns::MaxLon => "max_lon",
            Columns::MinLon => "min_lon",
            Columns::Radius => "radius",
            Columns::Samples => "samples",
            Columns::CreatedAt => "created_at",
            Columns::ModifiedAt => "modified_at",
        }
    }
}

/// A single cell tower. Position and extremes stay empty until enough
/// observations were collected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub radio: Radio,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u16,
    pub cid: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lat: Option<f64>,
    pub max_lon: Option<f64>,
    pub min_lon: Option<f64>,
    pub radius: Option<i64>,
    pub samples: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified_at: OffsetDateTime,
}

impl Cell {
    pub fn projection() -> &'static str {
        static PROJECTION: OnceLock<String> = OnceLock::new();
        PROJECTION.get_or_init(|| {
            [
                Columns::Radio,
                Columns::Mcc,
                Columns::Mnc,
                Columns::Lac,
                Columns::Cid,
                Columns::Lat,
                Columns::Lon,
                Columns::MaxLat,
                Columns::MinLat,
                Columns::MaxLon,
                Columns::MinLon,
                Columns::Radius,
                Columns::Samples,
                Columns::CreatedAt,
                Columns::ModifiedAt,
            ]
            .iter()
            .map(Columns::as_str)
            .collect::<Vec<_>>()
            .join(", ")
        })
    }

    pub const fn mapper() -> fn(&Row) -> rusqlite::Result<Self> {
        |row| {
            Ok(Self {
                radio: row.get(Columns::Radio.as_str())?,
                mcc: row.get(Columns::Mcc.as_str())?,
                mnc: row.get(Columns::Mnc.as_str())?,
                lac: row.get(Columns::Lac.as_str())?,
                cid: row.get(Columns::Cid.as_str())?,
                lat: row.get(Columns::Lat.as_str())?,
                lon: row.get(Columns::Lon.as_str())?,
                max_lat: row.get(Columns::MaxLat.as_str())?,
                min_lat: row.get(Columns::MinLat.as_str())?,
                max_lon: row.get(Columns::MaxLon.as_str())?,
                min_lon: row.get(Columns::MinLon.as_str())?,
                radius: row.get(Columns::Radius.as_str())?,
                samples: row.get(Columns::Samples.as_str())?,
                created_at: row.get(Columns::CreatedAt.as_str())?,
                modified_at: row.get(Columns::ModifiedAt.as_str())?,
            })
        }
    }

    /// Bounding box as `(max_lat, min_lat, max_lon, min_lon)`. Falls back to
    /// the center point when no extremes were recorded.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let (lat, lon) = (self.lat?, self.lon?);
        Some((
            self.max_lat.unwrap_or(lat),
            self.min_lat.unwrap_or(lat),
            self.max_lon.unwrap_or(lon),
            self.min_lon.unwrap_or(lon),
        ))
    }
}
