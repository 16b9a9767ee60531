use super::worker::{Dispatch, TaskMessage};
use crate::conf::Conf;
use crate::error_sink::ErrorSink;
use crate::kv::{KvClient, Pipeline, Reply};
use crate::metrics::Metrics;
use crate::queue::DataQueues;
use crate::Result;
use deadpool_sqlite::Pool;
use rusqlite::{Transaction, TransactionBehavior};
use serde::Serialize;
use std::sync::Arc;

/// Process wide resources, handed to every task call.
#[derive(Clone)]
pub struct TaskContext {
    pub conf: Conf,
    pub pool: Arc<Pool>,
    pub kv: KvClient,
    pub queues: DataQueues,
    pub errors: Arc<dyn ErrorSink>,
    pub metrics: Arc<dyn Metrics>,
    pub dispatcher: Arc<dyn Dispatch>,
}

impl TaskContext {
    /// Runs `f` in a transaction which is committed if `f` succeeds and
    /// rolled back otherwise. Defaults to a deferred transaction, sessions
    /// which read before they write should ask for an immediate one.
    pub async fn db_session<T, F>(&self, behavior: Option<TransactionBehavior>, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction) -> Result<T> + Send + 'static,
    {
        let behavior = behavior.unwrap_or(TransactionBehavior::Deferred);
        self.pool
            .get()
            .await?
            .interact(move |conn| {
                let tx = conn.transaction_with_behavior(behavior)?;
                let res = f(&tx)?;
                tx.commit()?;
                Ok(res)
            })
            .await?
    }

    /// Collects commands with `f` and executes them atomically. Nothing is
    /// sent if `f` fails.
    pub async fn kv_pipeline<F>(&self, f: F) -> Result<Vec<Reply>>
    where
        F: FnOnce(&mut Pipeline) -> Result<()>,
    {
        let mut pipe = self.kv.pipeline();
        f(&mut pipe)?;
        pipe.execute(&self.kv).await
    }

    /// Schedules a task by name.
    pub async fn dispatch<A: Serialize>(&self, task: &str, args: &A) -> Result<()> {
        let message = TaskMessage::new(task, serde_json::to_value(args)?);
        self.dispatcher.send(message).await
    }
}
