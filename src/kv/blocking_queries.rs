use crate::Result;
use rusqlite::{named_params, Connection, OptionalExtension};
use time::OffsetDateTime;

const TABLE_LIST: &str = "kv_list";
const TABLE_EXPIRY: &str = "kv_expiry";
const COL_ID: &str = "id";
const COL_KEY: &str = "key";
const COL_VALUE: &str = "value";
const COL_EXPIRES_AT: &str = "expires_at";

pub fn migrate(conn: &Connection) -> Result<()> {
    let query = format!(
        r#"
            CREATE TABLE IF NOT EXISTS {TABLE_LIST} (
                {COL_ID} INTEGER PRIMARY KEY AUTOINCREMENT,
                {COL_KEY} TEXT NOT NULL,
                {COL_VALUE} BLOB NOT NULL
            ) STRICT;
            CREATE INDEX IF NOT EXISTS {TABLE_LIST}_{COL_KEY} ON {TABLE_LIST} ({COL_KEY}, {COL_ID});
            CREATE TABLE IF NOT EXISTS {TABLE_EXPIRY} (
                {COL_KEY} TEXT PRIMARY KEY NOT NULL,
                {COL_EXPIRES_AT} REAL NOT NULL
            ) STRICT;
        "#
    );
    conn.execute_batch(&query)?;
    Ok(())
}

fn now() -> f64 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9
}

/// Drops the key if its TTL ran out. Every command calls this first.
fn purge_expired(key: &str, conn: &Connection) -> Result<()> {
    let expires_at: Option<f64> = conn
        .query_row(
            &format!("SELECT {COL_EXPIRES_AT} FROM {TABLE_EXPIRY} WHERE {COL_KEY} = :key"),
            named_params! { ":key": key },
            |row| row.get(0),
        )
        .optional()?;
    if let Some(expires_at) = expires_at {
        if expires_at <= now() {
            delete(key, conn)?;
        }
    }
    Ok(())
}

pub fn delete(key: &str, conn: &Connection) -> Result<i64> {
    let removed = conn.execute(
        &format!("DELETE FROM {TABLE_LIST} WHERE {COL_KEY} = :key"),
        named_params! { ":key": key },
    )?;
    conn.execute(
        &format!("DELETE FROM {TABLE_EXPIRY} WHERE {COL_KEY} = :key"),
        named_params! { ":key": key },
    )?;
    Ok(if removed > 0 { 1 } else { 0 })
}

pub fn rpush(key: &str, values: &[Vec<u8>], conn: &Connection) -> Result<i64> {
    purge_expired(key, conn)?;
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {TABLE_LIST} ({COL_KEY}, {COL_VALUE}) VALUES (:key, :value)"
    ))?;
    for value in values {
        stmt.execute(named_params! { ":key": key, ":value": value })?;
    }
    llen(key, conn)
}

pub fn llen(key: &str, conn: &Connection) -> Result<i64> {
    purge_expired(key, conn)?;
    conn.query_row(
        &format!("SELECT count(*) FROM {TABLE_LIST} WHERE {COL_KEY} = :key"),
        named_params! { ":key": key },
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Resolves Redis style inclusive indices, negative ones counting from the
/// end, into an `(offset, count)` window. `None` means an empty range.
fn window(start: i64, stop: i64, len: i64) -> Option<(i64, i64)> {
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        None
    } else {
        Some((start, stop - start + 1))
    }
}

pub fn lrange(key: &str, start: i64, stop: i64, conn: &Connection) -> Result<Vec<Vec<u8>>> {
    let len = llen(key, conn)?;
    let Some((offset, count)) = window(start, stop, len) else {
        return Ok(vec![]);
    };
    conn.prepare(&format!(
        r#"
            SELECT {COL_VALUE}
            FROM {TABLE_LIST}
            WHERE {COL_KEY} = :key
            ORDER BY {COL_ID}
            LIMIT :count OFFSET :offset
        "#
    ))?
    .query_map(
        named_params! { ":key": key, ":count": count, ":offset": offset },
        |row| row.get(0),
    )?
    .collect::<Result<Vec<_>, _>>()
    .map_err(Into::into)
}

/// Keeps only the elements within the range. An empty result removes the key.
pub fn ltrim(key: &str, start: i64, stop: i64, conn: &Connection) -> Result<()> {
    let len = llen(key, conn)?;
    let Some((offset, count)) = window(start, stop, len) else {
        delete(key, conn)?;
        return Ok(());
    };
    conn.execute(
        &format!(
            r#"
                DELETE FROM {TABLE_LIST}
                WHERE {COL_KEY} = :key AND {COL_ID} NOT IN (
                    SELECT {COL_ID}
                    FROM {TABLE_LIST}
                    WHERE {COL_KEY} = :key
                    ORDER BY {COL_ID}
                    LIMIT :count OFFSET :offset
                )
            "#
        ),
        named_params! { ":key": key, ":count": count, ":offset": offset },
    )?;
    Ok(())
}

/// Returns false if the key doesn't exist.
pub fn expire(key: &str, seconds: i64, conn: &Connection) -> Result<bool> {
    if llen(key, conn)? == 0 {
        return Ok(false);
    }
    conn.execute(
        &format!(
            r#"
                INSERT INTO {TABLE_EXPIRY} ({COL_KEY}, {COL_EXPIRES_AT})
                VALUES (:key, :expires_at)
                ON CONFLICT ({COL_KEY}) DO UPDATE SET {COL_EXPIRES_AT} = excluded.{COL_EXPIRES_AT}
            "#
        ),
        named_params! { ":key": key, ":expires_at": now() + seconds as f64 },
    )?;
    Ok(true)
}

/// Remaining time to live in seconds, -1 if the key has no TTL and -2 if
/// the key doesn't exist.
pub fn ttl(key: &str, conn: &Connection) -> Result<i64> {
    if llen(key, conn)? == 0 {
        return Ok(-2);
    }
    let expires_at: Option<f64> = conn
        .query_row(
            &format!("SELECT {COL_EXPIRES_AT} FROM {TABLE_EXPIRY} WHERE {COL_KEY} = :key"),
            named_params! { ":key": key },
            |row| row.get(0),
        )
        .optional()?;
    Ok(match expires_at {
        Some(expires_at) => (expires_at - now()).round().max(0.0) as i64,
        None => -1,
    })
}
