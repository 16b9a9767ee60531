use super::worker::{Dispatch, TaskMessage};
use super::{ShardArgs, TaskDef};
use crate::{Error, Result};
use futures_util::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

/// Parses an interval like `30s`, `9m` or `1h`.
pub fn parse_schedule(schedule: &str) -> Result<Duration> {
    let invalid = || Error::Config(format!("malformed schedule {schedule:?}"));
    let schedule = schedule.trim();
    let (split, _) = schedule.char_indices().last().ok_or_else(invalid)?;
    let (num, unit) = schedule.split_at(split);
    let num: u64 = num.parse().map_err(|_| invalid())?;
    if num == 0 {
        return Err(invalid());
    }
    let secs = match unit {
        "s" => num,
        "m" => num.checked_mul(60).ok_or_else(invalid)?,
        "h" => num.checked_mul(3600).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };
    Ok(Duration::from_secs(secs))
}

/// One recurring call of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct BeatEntry {
    pub name: String,
    pub task: &'static str,
    pub every: Duration,
    pub args: Value,
}

/// Beat entries declared by a task: none without a schedule, one per shard
/// with a shard model and exactly one otherwise.
pub fn entries(def: &TaskDef) -> Result<Vec<BeatEntry>> {
    let Some(schedule) = def.schedule else {
        return Ok(vec![]);
    };
    let every = parse_schedule(schedule)?;
    let shortname = def.shortname();
    let Some(shard_model) = def.shard_model else {
        return Ok(vec![BeatEntry {
            name: shortname,
            task: def.name,
            every,
            args: Value::Null,
        }]);
    };
    let shards = shard_model();
    if shards.is_empty() {
        return Err(Error::Config(format!("{} has no shards", def.name)));
    }
    shards
        .into_iter()
        .map(|shard_id| {
            Ok(BeatEntry {
                name: format!("{shortname}_{shard_id}"),
                task: def.name,
                every,
                args: serde_json::to_value(ShardArgs { shard_id })?,
            })
        })
        .collect()
}

/// Sends every entry to the dispatcher once per interval. The first call
/// happens one interval after start. Never returns on its own.
pub async fn run(entries: Vec<BeatEntry>, dispatcher: Arc<dyn Dispatch>) {
    info!(entries = entries.len(), "Starting beat");
    let loops = entries.into_iter().map(|entry| {
        let dispatcher = dispatcher.clone();
        async move {
            let mut interval = interval_at(Instant::now() + entry.every, entry.every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let message = TaskMessage::new(entry.task, entry.args.clone());
                if let Err(e) = dispatcher.send(message).await {
                    error!(entry = %entry.name, error = %e, "Failed to dispatch beat entry");
                }
            }
        }
    });
    join_all(loops).await;
}

#[cfg(test)]
mod test {
    use super::{entries, parse_schedule};
    use crate::task::TaskDef;
    use crate::{Error, Result};
    use serde_json::{json, Value};
    use std::time::Duration;

    #[test]
    fn schedule() -> Result<()> {
        assert_eq!(Duration::from_secs(8), parse_schedule("8s")?);
        assert_eq!(Duration::from_secs(540), parse_schedule("9m")?);
        assert_eq!(Duration::from_secs(7200), parse_schedule("2h")?);
        for bad in ["", "s", "0s", "10", "5d", "-1m", "1.5h"] {
            assert!(matches!(parse_schedule(bad), Err(Error::Config(_))), "{bad}");
        }
        Ok(())
    }

    #[test]
    fn schedule_overflow() -> Result<()> {
        for bad in [
            format!("{}m", u64::MAX),
            format!("{}h", u64::MAX / 3600 + 1),
        ] {
            assert!(matches!(parse_schedule(&bad), Err(Error::Config(_))), "{bad}");
        }
        assert_eq!(
            Duration::from_secs(u64::MAX / 3600 * 3600),
            parse_schedule(&format!("{}h", u64::MAX / 3600))?
        );
        Ok(())
    }

    #[test]
    fn sharded_entries() -> Result<()> {
        fn shards() -> Vec<String> {
            vec!["0".into(), "1".into()]
        }
        let def = TaskDef::new("radiomap.data.tasks.update_cell")
            .schedule("7s")
            .shard_model(shards);
        let entries = entries(&def)?;
        assert_eq!(2, entries.len());
        assert_eq!("data.update_cell_0", entries[0].name);
        assert_eq!(json!({"shard_id": "0"}), entries[0].args);
        assert_eq!("data.update_cell_1", entries[1].name);
        assert_eq!(json!({"shard_id": "1"}), entries[1].args);
        assert!(entries.iter().all(|it| it.task == def.name));
        assert!(entries.iter().all(|it| it.every == Duration::from_secs(7)));
        Ok(())
    }

    #[test]
    fn single_entry() -> Result<()> {
        let def = TaskDef::new("radiomap.data.tasks.scan_cellareas").schedule("8s");
        let entries = entries(&def)?;
        assert_eq!(1, entries.len());
        assert_eq!("data.scan_cellareas", entries[0].name);
        assert_eq!(Value::Null, entries[0].args);
        Ok(())
    }

    #[test]
    fn no_schedule() -> Result<()> {
        assert!(entries(&TaskDef::new("radiomap.a"))?.is_empty());
        Ok(())
    }

    #[test]
    fn empty_shard_model() {
        let def = TaskDef::new("radiomap.a").schedule("1m").shard_model(Vec::new);
        assert!(matches!(entries(&def), Err(Error::Config(_))));
    }
}
