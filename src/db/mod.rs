pub mod cell;
pub mod cell_area;
pub mod migration;

use crate::Result;
use deadpool_sqlite::{Config, Pool, Runtime};
use rusqlite::Connection;
use std::path::Path;

pub fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(conn)
}

/// Migrates the database at `path` and wraps it into an async pool.
pub fn open_pool(path: &Path) -> Result<Pool> {
    let mut conn = open_connection(path)?;
    migration::run(&mut conn)?;
    Ok(Config::new(path).create_pool(Runtime::Tokio1)?)
}
