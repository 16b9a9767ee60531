use super::beat::{self, BeatEntry};
use super::context::TaskContext;
use super::runtime;
use super::worker::TaskMessage;
use super::{Task, TaskDef};
use crate::{Error, Result};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// Type erased task, taking and returning JSON.
trait Handler: Send + Sync {
    fn def(&self) -> &TaskDef;
    fn accepts(&self, args: &Value) -> bool;
    fn call<'a>(&'a self, ctx: &'a TaskContext, args: Value) -> BoxFuture<'a, Result<Value>>;
}

struct TaskHandler<T: Task> {
    task: T,
    def: TaskDef,
}

impl<T: Task> Handler for TaskHandler<T> {
    fn def(&self) -> &TaskDef {
        &self.def
    }

    fn accepts(&self, args: &Value) -> bool {
        <T::Args as Deserialize>::deserialize(args).is_ok()
    }

    fn call<'a>(&'a self, ctx: &'a TaskContext, args: Value) -> BoxFuture<'a, Result<Value>> {
        async move {
            let args: T::Args = serde_json::from_value(args)?;
            let output = self.task.run(ctx, args).await?;
            Ok(serde_json::to_value(output)?)
        }
        .boxed()
    }
}

/// All tasks known to this process, by fully qualified name.
#[derive(Default)]
pub struct Registry {
    handlers: BTreeMap<&'static str, Arc<dyn Handler>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Fails on duplicate names and malformed schedules.
    pub fn register<T: Task>(&mut self, task: T) -> Result<()> {
        let def = task.def();
        if let Some(schedule) = def.schedule {
            beat::parse_schedule(schedule)?;
        }
        if self.handlers.contains_key(def.name) {
            return Err(Error::Config(format!("{} is already registered", def.name)));
        }
        self.handlers
            .insert(def.name, Arc::new(TaskHandler { task, def }));
        Ok(())
    }

    pub fn def(&self, name: &str) -> Result<&TaskDef> {
        self.handlers
            .get(name)
            .map(|handler| handler.def())
            .ok_or_else(|| Error::Generic(format!("unknown task {name}")))
    }

    /// Builds the schedule of every enabled recurring task.
    pub fn beat_config(&self) -> Result<Vec<BeatEntry>> {
        let mut res = vec![];
        let mut names = HashSet::new();
        for handler in self.handlers.values() {
            let def = handler.def();
            if !def.enabled.eval() {
                info!(task = def.name, "Task is disabled, skipping beat entries");
                continue;
            }
            for entry in beat::entries(def)? {
                if !handler.accepts(&entry.args) {
                    return Err(Error::Config(format!(
                        "{} can't be called with {}, missing shard model?",
                        def.name, entry.args
                    )));
                }
                if !names.insert(entry.name.clone()) {
                    return Err(Error::Config(format!(
                        "duplicate beat entry {}",
                        entry.name
                    )));
                }
                res.push(entry);
            }
        }
        Ok(res)
    }

    /// Executes a dispatched message through the task runtime.
    pub async fn call(&self, ctx: &TaskContext, message: TaskMessage) -> Result<Value> {
        let handler = self
            .handlers
            .get(message.task.as_str())
            .ok_or_else(|| Error::Generic(format!("unknown task {}", message.task)))?;
        let body = handler.call(ctx, message.args.clone());
        runtime::execute(handler.def(), ctx, &message, body).await.1
    }

    /// Runs a task right away. In testing the arguments first go through
    /// the same encoding a dispatched message would.
    pub async fn apply<A: Serialize>(&self, ctx: &TaskContext, task: &str, args: &A) -> Result<Value> {
        let args = if ctx.conf.testing {
            serde_json::from_slice(&serde_json::to_vec(args)?)?
        } else {
            serde_json::to_value(args)?
        };
        self.call(ctx, TaskMessage::new(task, args)).await
    }
}
