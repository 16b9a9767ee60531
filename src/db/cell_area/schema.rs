use crate::constants::AccuracyClass;
use crate::model::{AreaKey, Radio};
use rusqlite::Row;
use serde::Serialize;
use std::sync::OnceLock;
use time::OffsetDateTime;

pub enum Columns {
    Radio,
    Mcc,
    Mnc,
    Lac,
    Lat,
    Lon,
    Radius,
    AvgCellRadius,
    NumCells,
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
            Columns::Lat => "lat",
            Columns::Lon => "lon",
            Columns::Radius => "radius",
            Columns::AvgCellRadius => "avg_cell_radius",
            Columns::NumCells => "num_cells",
            Columns::CreatedAt => "created_at",
            Columns::ModifiedAt => "modified_at",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Area {
    pub radio: Radio,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u16,
    pub lat: f64,
    pub lon: f64,
    pub radius: i64,
    pub avg_cell_radius: Option<i64>,
    pub num_cells: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified_at: OffsetDateTime,
}

impl Area {
    pub fn projection() -> &'static str {
        static PROJECTION: OnceLock<String> = OnceLock::new();
        PROJECTION.get_or_init(|| {
            [
                Columns::Radio,
                Columns::Mcc,
                Columns::Mnc,
                Columns::Lac,
                Columns::Lat,
                Columns::Lon,
                Columns::Radius,
                Columns::AvgCellRadius,
                Columns::NumCells,
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
                lat: row.get(Columns::Lat.as_str())?,
                lon: row.get(Columns::Lon.as_str())?,
                radius: row.get(Columns::Radius.as_str())?,
                avg_cell_radius: row.get(Columns::AvgCellRadius.as_str())?,
                num_cells: row.get(Columns::NumCells.as_str())?,
                created_at: row.get(Columns::CreatedAt.as_str())?,
                modified_at: row.get(Columns::ModifiedAt.as_str())?,
            })
        }
    }

    pub fn key(&self) -> AreaKey {
        AreaKey::new(self.radio, self.mcc, self.mnc, self.lac)
    }

    pub fn accuracy(&self) -> AccuracyClass {
        AccuracyClass::from_number(self.radius as f64)
    }
}
