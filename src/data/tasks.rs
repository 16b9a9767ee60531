use super::area::{AreaUpdater, UpdateAreasArgs, SCAN_BATCH};
use super::monitor::monitor_queue_size;
use super::station::StationUpdater;
use crate::model::{Radio, StationSet};
use crate::task::{Registry, ShardArgs, Task, TaskContext, TaskDef};
use crate::Result;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::BTreeMap;

pub const SCAN_CELLAREAS: &str = "radiomap.data.tasks.scan_cellareas";
pub const SCAN_CELLAREAS_OCID: &str = "radiomap.data.tasks.scan_cellareas_ocid";
pub const UPDATE_CELLAREAS: &str = "radiomap.data.tasks.update_cellareas";
pub const UPDATE_CELLAREAS_OCID: &str = "radiomap.data.tasks.update_cellareas_ocid";
pub const UPDATE_CELL: &str = "radiomap.data.tasks.update_cell";
pub const MONITOR_QUEUE_SIZE: &str = "radiomap.data.tasks.monitor_queue_size";

pub fn register_all(registry: &mut Registry) -> Result<()> {
    registry.register(ScanAreas(StationSet::CELL))?;
    registry.register(ScanAreas(StationSet::OCID))?;
    registry.register(UpdateAreas(StationSet::CELL))?;
    registry.register(UpdateAreas(StationSet::OCID))?;
    registry.register(UpdateCell)?;
    registry.register(MonitorQueueSize)?;
    Ok(())
}

/// Task names for a station set: `(scan, update)`.
fn area_tasks(set: StationSet) -> (&'static str, &'static str) {
    if set == StationSet::OCID {
        (SCAN_CELLAREAS_OCID, UPDATE_CELLAREAS_OCID)
    } else {
        (SCAN_CELLAREAS, UPDATE_CELLAREAS)
    }
}

pub struct ScanAreas(pub StationSet);

impl Task for ScanAreas {
    type Args = ();
    type Output = usize;

    fn def(&self) -> TaskDef {
        let (scan, _) = area_tasks(self.0);
        // imported data changes rarely
        let schedule = if self.0 == StationSet::OCID { "9m" } else { "8s" };
        TaskDef::new(scan).schedule(schedule)
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, _args: ()) -> BoxFuture<'a, Result<usize>> {
        async move {
            let (_, update) = area_tasks(self.0);
            AreaUpdater::new(ctx, self.0).scan(update, SCAN_BATCH).await
        }
        .boxed()
    }
}

pub struct UpdateAreas(pub StationSet);

impl Task for UpdateAreas {
    type Args = UpdateAreasArgs;
    type Output = usize;

    fn def(&self) -> TaskDef {
        let (_, update) = area_tasks(self.0);
        TaskDef::new(update)
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, args: UpdateAreasArgs) -> BoxFuture<'a, Result<usize>> {
        async move { AreaUpdater::new(ctx, self.0).update(args.area_keys).await }.boxed()
    }
}

pub struct UpdateCell;

impl Task for UpdateCell {
    type Args = ShardArgs;
    type Output = usize;

    fn def(&self) -> TaskDef {
        TaskDef::new(UPDATE_CELL)
            .schedule("7s")
            .shard_model(Radio::shards)
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, args: ShardArgs) -> BoxFuture<'a, Result<usize>> {
        async move {
            let (stored, more) = StationUpdater::new(ctx, &args.shard_id).update(None).await?;
            if more {
                ctx.dispatch(UPDATE_CELL, &args).await?;
            }
            Ok(stored)
        }
        .boxed()
    }
}

pub struct MonitorQueueSize;

impl Task for MonitorQueueSize {
    type Args = ();
    type Output = BTreeMap<String, i64>;

    fn def(&self) -> TaskDef {
        TaskDef::new(MONITOR_QUEUE_SIZE).schedule("60s")
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, _args: ()) -> BoxFuture<'a, Result<Self::Output>> {
        async move { monitor_queue_size(ctx).await }.boxed()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::cell::blocking_queries as cell_queries;
    use crate::db::cell_area::blocking_queries as area_queries;
    use crate::model::AreaKey;
    use crate::queue::cell_queue_key;
    use crate::task::TaskMessage;
    use crate::test::{mock_cell, mock_context};
    use crate::Error;
    use serde_json::json;
    use std::time::Duration;
    use tokio::test;

    fn registry() -> Result<Registry> {
        let mut registry = Registry::new();
        register_all(&mut registry)?;
        Ok(registry)
    }

    #[test]
    async fn beat_config() -> Result<()> {
        let entries = registry()?.beat_config()?;
        let mut names: Vec<_> = entries.iter().map(|it| it.name.as_str()).collect();
        names.sort();
        assert_eq!(
            vec![
                "data.monitor_queue_size",
                "data.scan_cellareas",
                "data.scan_cellareas_ocid",
                "data.update_cell_gsm",
                "data.update_cell_lte",
                "data.update_cell_wcdma",
            ],
            names
        );
        let ocid = entries
            .iter()
            .find(|it| it.name == "data.scan_cellareas_ocid")
            .ok_or("missing entry")?;
        assert_eq!(Duration::from_secs(540), ocid.every);
        Ok(())
    }

    #[test]
    async fn scan_then_update() -> Result<()> {
        let mock = mock_context(true).await;
        let registry = registry()?;
        let set = StationSet::OCID;
        let key = AreaKey::new(Radio::Gsm, 262, 1, 100);
        cell_queries::upsert(set.station_table, &mock_cell(Radio::Gsm, 1, Some((3.0, 4.0))), &mock.conn)?;
        let queue = mock.ctx.queues.get(set.queue)?;
        queue.enqueue(&[key.encode(), key.encode()], None).await?;

        let scanned = registry.apply(&mock.ctx, SCAN_CELLAREAS_OCID, &()).await?;
        assert_eq!(json!(1), scanned);
        let sent = mock.dispatcher.sent();
        assert_eq!(1, sent.len());
        assert_eq!(UPDATE_CELLAREAS_OCID, sent[0].task);

        let updated = registry.call(&mock.ctx, sent[0].clone()).await?;
        assert_eq!(json!(1), updated);
        let area = area_queries::select_by_key(set.area_table, &key, &mock.conn)?;
        assert_eq!(Some(1), area.map(|it| it.num_cells));
        assert!(area_queries::select_by_key(StationSet::CELL.area_table, &key, &mock.conn)?.is_none());
        assert_eq!(
            vec![
                "task|task:data.scan_cellareas_ocid",
                "task|task:data.update_cellareas_ocid"
            ],
            mock.metrics.timings()
        );
        Ok(())
    }

    #[test]
    async fn update_cell_redispatches_backlog() -> Result<()> {
        let mock = mock_context(true).await;
        let queue = mock.ctx.queues.get(&cell_queue_key("gsm"))?;
        let report = json!({
            "radio": "gsm", "mcc": 262, "mnc": 1, "lac": 5, "cid": 1, "lat": 1.0, "lon": 1.0
        });
        // two full batches
        queue.enqueue(&vec![report; 1_000], None).await?;
        let stored = registry()?
            .apply(&mock.ctx, UPDATE_CELL, &ShardArgs { shard_id: "gsm".into() })
            .await?;
        assert_eq!(json!(500), stored);
        let sent = mock.dispatcher.sent();
        let redispatched: Vec<&TaskMessage> =
            sent.iter().filter(|it| it.task == UPDATE_CELL).collect();
        assert_eq!(1, redispatched.len());
        assert_eq!(json!({"shard_id": "gsm"}), redispatched[0].args);
        Ok(())
    }

    #[test]
    async fn failing_update_is_not_retried_in_testing() -> Result<()> {
        let mock = mock_context(true).await;
        let res = registry()?
            .apply(
                &mock.ctx,
                UPDATE_CELLAREAS,
                &UpdateAreasArgs {
                    area_keys: vec![json!("not a key")],
                },
            )
            .await;
        assert!(matches!(res, Err(Error::Encoding(_))));
        assert_eq!(1, mock.errors.captured().len());
        assert!(mock.dispatcher.retried().is_empty());
        Ok(())
    }

    #[test]
    async fn failing_update_is_retried() -> Result<()> {
        let mock = mock_context(false).await;
        let res = registry()?
            .apply(
                &mock.ctx,
                UPDATE_CELLAREAS,
                &UpdateAreasArgs {
                    area_keys: vec![json!("not a key")],
                },
            )
            .await;
        assert!(matches!(res, Err(Error::Retry { .. })));
        assert_eq!(1, mock.errors.captured().len());
        assert_eq!(1, mock.dispatcher.retried().len());
        Ok(())
    }

    #[test]
    async fn monitor() -> Result<()> {
        let mock = mock_context(true).await;
        let sizes = registry()?.apply(&mock.ctx, MONITOR_QUEUE_SIZE, &()).await?;
        assert_eq!(json!(0), sizes["update_cellarea"]);
        Ok(())
    }
}
