use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Cell radio network type. The discriminant is the on-disk and on-wire value.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Radio {
    Gsm = 0,
    Cdma = 1,
    Wcdma = 2,
    Lte = 3,
}

impl Radio {
    pub fn from_u8(value: u8) -> Option<Radio> {
        Radio::iter().find(|radio| *radio as u8 == value)
    }

    /// Radio types which have their own station shard. CDMA is not supported.
    pub fn shards() -> Vec<String> {
        Radio::iter()
            .filter(|radio| *radio != Radio::Cdma)
            .map(|radio| radio.to_string())
            .collect()
    }
}

impl ToSql for Radio {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(*self as u8 as i64))
    }
}

impl FromSql for Radio {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let value = value.as_i64()?;
        u8::try_from(value)
            .ok()
            .and_then(Radio::from_u8)
            .ok_or(FromSqlError::OutOfRange(value))
    }
}
