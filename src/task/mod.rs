//! Background task plumbing.
//!
//! Each task is a [`Task`] implementation registered in a [`Registry`].
//! Every call goes through [`runtime::execute`], which times it, reports
//! failures and asks the dispatcher for a retry. Recurring tasks are fired
//! by [`beat::run`] and executed by [`worker::run`].

pub mod beat;
pub mod context;
pub mod registry;
pub mod runtime;
pub mod worker;

pub use context::TaskContext;
pub use registry::Registry;
pub use worker::{Dispatch, TaskMessage};

use crate::Result;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const NAMESPACE: &str = "radiomap";

/// Whether a recurring task is added to the beat schedule.
#[derive(Clone, Copy)]
pub enum Enabled {
    Const(bool),
    /// Evaluated once, when the beat schedule is built.
    When(fn() -> bool),
}

impl Enabled {
    pub fn eval(&self) -> bool {
        match self {
            Enabled::Const(enabled) => *enabled,
            Enabled::When(predicate) => predicate(),
        }
    }
}

/// Static description of a task.
#[derive(Clone)]
pub struct TaskDef {
    /// Fully qualified name, like `radiomap.data.tasks.update_cell`.
    pub name: &'static str,
    /// Interval expression such as `8s`, `9m` or `1h`.
    pub schedule: Option<&'static str>,
    /// Returns the current shard ids. Each one gets its own beat entry.
    pub shard_model: Option<fn() -> Vec<String>>,
    pub enabled: Enabled,
    pub auto_retry: bool,
}

impl TaskDef {
    pub fn new(name: &'static str) -> TaskDef {
        TaskDef {
            name,
            schedule: None,
            shard_model: None,
            enabled: Enabled::Const(true),
            auto_retry: true,
        }
    }

    pub fn schedule(mut self, schedule: &'static str) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn shard_model(mut self, shard_model: fn() -> Vec<String>) -> Self {
        self.shard_model = Some(shard_model);
        self
    }

    pub fn enabled(mut self, enabled: Enabled) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn auto_retry(mut self, auto_retry: bool) -> Self {
        self.auto_retry = auto_retry;
        self
    }

    /// The name without namespace and `tasks` segments, used in metrics
    /// and beat entry names.
    pub fn shortname(&self) -> String {
        self.name
            .split('.')
            .filter(|segment| *segment != NAMESPACE && *segment != "tasks")
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Arguments of sharded tasks. Beat binds one shard id per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardArgs {
    pub shard_id: String,
}

pub trait Task: Send + Sync + 'static {
    type Args: Serialize + DeserializeOwned + Send + 'static;
    type Output: Serialize + Send + 'static;

    fn def(&self) -> TaskDef;

    fn run<'a>(&'a self, ctx: &'a TaskContext, args: Self::Args)
        -> BoxFuture<'a, Result<Self::Output>>;
}
