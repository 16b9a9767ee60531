//! Cell area aggregation.
//!
//! Changed area keys arrive on the station set's queue. [`AreaUpdater::scan`]
//! drains it and fans the distinct keys out to update tasks, which recompute
//! each area from its current cells with [`update_area`].

use crate::db::cell::blocking_queries as cell_queries;
use crate::db::cell::schema::Cell;
use crate::db::cell_area::blocking_queries as area_queries;
use crate::db::cell_area::schema::Area;
use crate::geocalc;
use crate::model::area_key::QueuedAreaKey;
use crate::model::{AreaKey, StationSet};
use crate::task::TaskContext;
use crate::Result;
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use time::OffsetDateTime;
use tracing::{debug, warn};

/// Number of queued keys read by one scan.
pub const SCAN_BATCH: usize = 100;
/// Number of keys handed to one update task.
pub const UPDATE_BATCH: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAreasArgs {
    pub area_keys: Vec<Value>,
}

/// Spatial summary of the positioned cells of one area.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaStats {
    pub lat: f64,
    pub lon: f64,
    pub radius: i64,
    pub avg_cell_radius: Option<i64>,
    pub num_cells: i64,
}

impl AreaStats {
    /// `None` if no cell has a position.
    pub fn from_cells(cells: &[Cell]) -> Option<AreaStats> {
        let mut points = vec![];
        let (mut max_lat, mut min_lat) = (f64::MIN, f64::MAX);
        let (mut max_lon, mut min_lon) = (f64::MIN, f64::MAX);
        for cell in cells {
            let (Some(lat), Some(lon), Some(bounds)) = (cell.lat, cell.lon, cell.bounds()) else {
                continue;
            };
            points.push((lat, lon));
            max_lat = max_lat.max(bounds.0);
            min_lat = min_lat.min(bounds.1);
            max_lon = max_lon.max(bounds.2);
            min_lon = min_lon.min(bounds.3);
        }
        let (lat, lon) = geocalc::centroid(&points)?;
        let corner_radius =
            geocalc::circle_radius(lat, lon, max_lat, max_lon, min_lat, min_lon).ceil() as i64;
        let cell_radii: Vec<i64> = cells
            .iter()
            .filter(|cell| cell.lat.is_some() && cell.lon.is_some())
            .filter_map(|cell| cell.radius)
            .collect();
        let max_cell_radius = cell_radii.iter().copied().max().unwrap_or(0);
        let avg_cell_radius = if cell_radii.is_empty() {
            None
        } else {
            let sum: i64 = cell_radii.iter().sum();
            Some((sum as f64 / cell_radii.len() as f64).round() as i64)
        };
        Some(AreaStats {
            lat,
            lon,
            radius: corner_radius.max(max_cell_radius),
            avg_cell_radius,
            num_cells: points.len() as i64,
        })
    }
}

/// Recomputes one area from the current cells. Deletes the area if none
/// of its cells has a position. Returns the stored area, if any.
pub fn update_area(
    set: StationSet,
    key: &AreaKey,
    now: OffsetDateTime,
    conn: &Connection,
) -> Result<Option<Area>> {
    let cells = cell_queries::select_positioned_by_area(set.station_table, key, conn)?;
    let Some(stats) = AreaStats::from_cells(&cells) else {
        let deleted = area_queries::delete_by_key(set.area_table, key, conn)?;
        debug!(area = %key, deleted, "Area has no positioned cells");
        return Ok(None);
    };
    let area = Area {
        radio: key.radio,
        mcc: key.mcc,
        mnc: key.mnc,
        lac: key.lac,
        lat: stats.lat,
        lon: stats.lon,
        radius: stats.radius,
        avg_cell_radius: stats.avg_cell_radius,
        num_cells: stats.num_cells,
        created_at: now,
        modified_at: now,
    };
    area_queries::upsert(set.area_table, &area, conn)?;
    area_queries::select_by_key(set.area_table, key, conn)
}

pub struct AreaUpdater<'a> {
    ctx: &'a TaskContext,
    set: StationSet,
}

impl<'a> AreaUpdater<'a> {
    pub fn new(ctx: &'a TaskContext, set: StationSet) -> AreaUpdater<'a> {
        AreaUpdater { ctx, set }
    }

    /// Drains up to `batch` queued keys and dispatches the distinct ones to
    /// `update_task` in groups of [`UPDATE_BATCH`]. Keys which can't be
    /// decoded are reported and skipped, since they are already off the
    /// queue. Returns the number of distinct keys dispatched.
    pub async fn scan(&self, update_task: &str, batch: usize) -> Result<usize> {
        let queue = self.ctx.queues.get(self.set.queue)?;
        let items = queue.dequeue_results::<Value>(Some(batch)).await?;
        let mut area_keys = BTreeSet::new();
        for item in items {
            match item
                .and_then(QueuedAreaKey::from_value)
                .and_then(|key| key.normalize())
            {
                Ok(key) => {
                    area_keys.insert(key);
                }
                Err(e) => {
                    warn!(queue = self.set.queue, error = %e, "Skipping queued area key");
                    self.ctx.errors.capture(self.set.queue, &e);
                }
            }
        }
        let area_keys: Vec<Value> = area_keys.into_iter().map(Value::String).collect();
        for chunk in area_keys.chunks(UPDATE_BATCH) {
            let args = UpdateAreasArgs {
                area_keys: chunk.to_vec(),
            };
            self.ctx.dispatch(update_task, &args).await?;
        }
        Ok(area_keys.len())
    }

    /// Recomputes the given areas in one storage session. Every key is
    /// decoded up front, a single malformed key fails the whole call.
    /// Returns the number of distinct areas recomputed.
    ///
    /// The session reads cells before writing areas, so it takes the write
    /// lock when it begins.
    pub async fn update(&self, area_keys: Vec<Value>) -> Result<usize> {
        let area_keys = area_keys
            .into_iter()
            .map(|value| QueuedAreaKey::from_value(value)?.area_key())
            .collect::<Result<BTreeSet<AreaKey>>>()?;
        let set = self.set;
        let now = OffsetDateTime::now_utc();
        self.ctx
            .db_session(Some(TransactionBehavior::Immediate), move |tx| {
                for key in &area_keys {
                    update_area(set, key, now, tx)?;
                }
                Ok(area_keys.len())
            })
            .await
    }
}
