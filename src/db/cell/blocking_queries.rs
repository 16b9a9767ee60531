use super::schema::{Cell, Columns};
use crate::model::AreaKey;
use crate::Result;
use rusqlite::{named_params, Connection};
use time::format_description::well_known::Rfc3339;

/// Inserts the cell or overwrites everything but its creation time.
pub fn upsert(table: &str, cell: &Cell, conn: &Connection) -> Result<()> {
    let sql = format!(
        r#"
            INSERT INTO {table} ({projection})
            VALUES (
                :radio, :mcc, :mnc, :lac, :cid,
                :lat, :lon, :max_lat, :min_lat, :max_lon, :min_lon,
                :radius, :samples, :created_at, :modified_at
            )
            ON CONFLICT ({radio}, {mcc}, {mnc}, {lac}, {cid}) DO UPDATE SET
                {lat} = excluded.{lat},
                {lon} = excluded.{lon},
                {max_lat} = excluded.{max_lat},
                {min_lat} = excluded.{min_lat},
                {max_lon} = excluded.{max_lon},
                {min_lon} = excluded.{min_lon},
                {radius} = excluded.{radius},
                {samples} = excluded.{samples},
                {modified_at} = excluded.{modified_at}
        "#,
        projection = Cell::projection(),
        radio = Columns::Radio.as_str(),
        mcc = Columns::Mcc.as_str(),
        mnc = Columns::Mnc.as_str(),
        lac = Columns::Lac.as_str(),
        cid = Columns::Cid.as_str(),
        lat = Columns::Lat.as_str(),
        lon = Columns::Lon.as_str(),
        max_lat = Columns::MaxLat.as_str(),
        min_lat = Columns::MinLat.as_str(),
        max_lon = Columns::MaxLon.as_str(),
        min_lon = Columns::MinLon.as_str(),
        radius = Columns::Radius.as_str(),
        samples = Columns::Samples.as_str(),
        modified_at = Columns::ModifiedAt.as_str(),
    );
    conn.execute(
        &sql,
        named_params! {
            ":radio": cell.radio,
            ":mcc": cell.mcc,
            ":mnc": cell.mnc,
            ":lac": cell.lac,
            ":cid": cell.cid,
            ":lat": cell.lat,
            ":lon": cell.lon,
            ":max_lat": cell.max_lat,
            ":min_lat": cell.min_lat,
            ":max_lon": cell.max_lon,
            ":min_lon": cell.min_lon,
            ":radius": cell.radius,
            ":samples": cell.samples,
            ":created_at": cell.created_at.format(&Rfc3339)?,
            ":modified_at": cell.modified_at.format(&Rfc3339)?,
        },
    )?;
    Ok(())
}

/// Cells belonging to the area which have a known position.
pub fn select_positioned_by_area(table: &str, key: &AreaKey, conn: &Connection) -> Result<Vec<Cell>> {
    let sql = format!(
        r#"
            SELECT {projection}
            FROM {table}
            WHERE {radio} = :radio
                AND {mcc} = :mcc
                AND {mnc} = :mnc
                AND {lac} = :lac
                AND {lat} IS NOT NULL
                AND {lon} IS NOT NULL
            ORDER BY {cid}
        "#,
        projection = Cell::projection(),
        radio = Columns::Radio.as_str(),
        mcc = Columns::Mcc.as_str(),
        mnc = Columns::Mnc.as_str(),
        lac = Columns::Lac.as_str(),
        lat = Columns::Lat.as_str(),
        lon = Columns::Lon.as_str(),
        cid = Columns::Cid.as_str(),
    );
    conn.prepare(&sql)?
        .query_map(
            named_params! {
                ":radio": key.radio,
                ":mcc": key.mcc,
                ":mnc": key.mnc,
                ":lac": key.lac,
            },
            Cell::mapper(),
        )?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Into::into)
}

/// Removes a single cell, returns the number of deleted rows.
pub fn delete(table: &str, key: &AreaKey, cid: i64, conn: &Connection) -> Result<usize> {
    let sql = format!(
        r#"
            DELETE FROM {table}
            WHERE {radio} = :radio
                AND {mcc} = :mcc
                AND {mnc} = :mnc
                AND {lac} = :lac
                AND {cid} = :cid
        "#,
        radio = Columns::Radio.as_str(),
        mcc = Columns::Mcc.as_str(),
        mnc = Columns::Mnc.as_str(),
        lac = Columns::Lac.as_str(),
        cid = Columns::Cid.as_str(),
    );
    conn.execute(
        &sql,
        named_params! {
            ":radio": key.radio,
            ":mcc": key.mcc,
            ":mnc": key.mnc,
            ":lac": key.lac,
            ":cid": cid,
        },
    )
    .map_err(Into::into)
}
