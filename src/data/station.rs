use crate::constants::ObservationSource;
use crate::db::cell::blocking_queries as cell_queries;
use crate::db::cell::schema::Cell;
use crate::model::{AreaKey, Radio, StationSet};
use crate::queue::cell_queue_key;
use crate::task::TaskContext;
use crate::{Error, Result};
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use time::OffsetDateTime;
use tracing::warn;

/// A positioned cell as delivered on an `update_cell_<shard>` queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationReport {
    pub radio: Radio,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u16,
    pub cid: i64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub max_lat: Option<f64>,
    #[serde(default)]
    pub min_lat: Option<f64>,
    #[serde(default)]
    pub max_lon: Option<f64>,
    #[serde(default)]
    pub min_lon: Option<f64>,
    #[serde(default)]
    pub radius: Option<i64>,
    #[serde(default = "default_samples")]
    pub samples: i64,
    #[serde(default)]
    pub source: ObservationSource,
}

fn default_samples() -> i64 {
    1
}

impl StationReport {
    pub fn area_key(&self) -> AreaKey {
        AreaKey::new(self.radio, self.mcc, self.mnc, self.lac)
    }

    fn into_cell(self, now: OffsetDateTime) -> Cell {
        Cell {
            radio: self.radio,
            mcc: self.mcc,
            mnc: self.mnc,
            lac: self.lac,
            cid: self.cid,
            lat: Some(self.lat),
            lon: Some(self.lon),
            max_lat: self.max_lat,
            min_lat: self.min_lat,
            max_lon: self.max_lon,
            min_lon: self.min_lon,
            radius: self.radius,
            samples: self.samples,
            created_at: now,
            modified_at: now,
        }
    }
}

/// Stores queued cells of one radio shard and announces their areas.
pub struct StationUpdater<'a> {
    ctx: &'a TaskContext,
    shard_id: &'a str,
}

impl<'a> StationUpdater<'a> {
    pub fn new(ctx: &'a TaskContext, shard_id: &'a str) -> StationUpdater<'a> {
        StationUpdater { ctx, shard_id }
    }

    /// Processes one batch. Returns the number of stored cells and whether
    /// the queue still holds a full batch.
    pub async fn update(&self, batch: Option<usize>) -> Result<(usize, bool)> {
        let radio = Radio::from_str(self.shard_id)
            .map_err(|_| Error::Generic(format!("unknown cell shard {}", self.shard_id)))?;
        let queue = self.ctx.queues.get(&cell_queue_key(self.shard_id))?;
        let mut reports = vec![];
        for item in queue.dequeue_results::<StationReport>(batch).await? {
            match item {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(queue = %queue.key, error = %e, "Skipping queued cell");
                    self.ctx.errors.capture(&queue.key, &e);
                }
            }
        }
        let (reports, foreign): (Vec<_>, Vec<_>) =
            reports.into_iter().partition(|it| it.radio == radio);
        if !foreign.is_empty() {
            warn!(shard = self.shard_id, count = foreign.len(), "Dropping cells of another radio");
        }
        if reports.is_empty() {
            return Ok((0, queue.ready(batch).await?));
        }

        let mut sources: BTreeMap<String, i64> = BTreeMap::new();
        let mut area_keys = BTreeSet::new();
        for report in &reports {
            *sources.entry(report.source.to_string()).or_default() += 1;
            area_keys.insert(report.area_key().encode());
        }
        let now = OffsetDateTime::now_utc();
        let cells: Vec<Cell> = reports.into_iter().map(|it| it.into_cell(now)).collect();
        let stored = cells.len();
        self.ctx
            .db_session(Some(TransactionBehavior::Immediate), move |tx| {
                for cell in &cells {
                    cell_queries::upsert(StationSet::CELL.station_table, cell, tx)?;
                }
                Ok(())
            })
            .await?;

        let area_queue = self.ctx.queues.get(StationSet::CELL.queue)?;
        let area_keys: Vec<String> = area_keys.into_iter().collect();
        self.ctx
            .kv_pipeline(|pipe| area_queue.enqueue_with(pipe, &area_keys, None))
            .await?;

        for (source, count) in &sources {
            self.ctx.metrics.incr(
                "data.station.upload",
                *count,
                &[("type", "cell"), ("source", source.as_str())],
            );
        }
        Ok((stored, queue.ready(batch).await?))
    }
}
