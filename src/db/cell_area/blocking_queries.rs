use super::schema::{Area, Columns};
use crate::model::AreaKey;
use crate::Result;
use rusqlite::{named_params, Connection, OptionalExtension};
use time::format_description::well_known::Rfc3339;

/// Inserts the area or updates its derived fields, keeping the creation time.
pub fn upsert(table: &str, area: &Area, conn: &Connection) -> Result<()> {
    let sql = format!(
        r#"
            INSERT INTO {table} ({projection})
            VALUES (
                :radio, :mcc, :mnc, :lac,
                :lat, :lon, :radius, :avg_cell_radius, :num_cells,
                :created_at, :modified_at
            )
            ON CONFLICT ({radio}, {mcc}, {mnc}, {lac}) DO UPDATE SET
                {lat} = excluded.{lat},
                {lon} = excluded.{lon},
                {radius} = excluded.{radius},
                {avg_cell_radius} = excluded.{avg_cell_radius},
                {num_cells} = excluded.{num_cells},
                {modified_at} = excluded.{modified_at}
        "#,
        projection = Area::projection(),
        radio = Columns::Radio.as_str(),
        mcc = Columns::Mcc.as_str(),
        mnc = Columns::Mnc.as_str(),
        lac = Columns::Lac.as_str(),
        lat = Columns::Lat.as_str(),
        lon = Columns::Lon.as_str(),
        radius = Columns::Radius.as_str(),
        avg_cell_radius = Columns::AvgCellRadius.as_str(),
        num_cells = Columns::NumCells.as_str(),
        modified_at = Columns::ModifiedAt.as_str(),
    );
    conn.execute(
        &sql,
        named_params! {
            ":radio": area.radio,
            ":mcc": area.mcc,
            ":mnc": area.mnc,
            ":lac": area.lac,
            ":lat": area.lat,
            ":lon": area.lon,
            ":radius": area.radius,
            ":avg_cell_radius": area.avg_cell_radius,
            ":num_cells": area.num_cells,
            ":created_at": area.created_at.format(&Rfc3339)?,
            ":modified_at": area.modified_at.format(&Rfc3339)?,
        },
    )?;
    Ok(())
}

pub fn select_by_key(table: &str, key: &AreaKey, conn: &Connection) -> Result<Option<Area>> {
    let sql = format!(
        r#"
            SELECT {projection}
            FROM {table}
            WHERE {radio} = :radio AND {mcc} = :mcc AND {mnc} = :mnc AND {lac} = :lac
        "#,
        projection = Area::projection(),
        radio = Columns::Radio.as_str(),
        mcc = Columns::Mcc.as_str(),
        mnc = Columns::Mnc.as_str(),
        lac = Columns::Lac.as_str(),
    );
    conn.query_row(
        &sql,
        named_params! {
            ":radio": key.radio,
            ":mcc": key.mcc,
            ":mnc": key.mnc,
            ":lac": key.lac,
        },
        Area::mapper(),
    )
    .optional()
    .map_err(Into::into)
}

/// Returns the number of deleted rows, 0 if the area didn't exist.
pub fn delete_by_key(table: &str, key: &AreaKey, conn: &Connection) -> Result<usize> {
    let sql = format!(
        r#"
            DELETE FROM {table}
            WHERE {radio} = :radio AND {mcc} = :mcc AND {mnc} = :mnc AND {lac} = :lac
        "#,
        radio = Columns::Radio.as_str(),
        mcc = Columns::Mcc.as_str(),
        mnc = Columns::Mnc.as_str(),
        lac = Columns::Lac.as_str(),
    );
    conn.execute(
        &sql,
        named_params! {
            ":radio": key.radio,
            ":mcc": key.mcc,
            ":mnc": key.mnc,
            ":lac": key.lac,
        },
    )
    .map_err(Into::into)
}
