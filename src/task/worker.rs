use super::context::TaskContext;
use super::registry::Registry;
use crate::queue::DataQueue;
use crate::{Error, Result};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Key of the queue carrying dispatched task messages.
pub const TASK_QUEUE: &str = "task_messages";
/// Longest delay between two attempts of the same message.
const MAX_BACKOFF: Duration = Duration::from_secs(300);
/// Messages taken off the queue per poll.
const POLL_BATCH: usize = 50;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Dispatch envelope, serialized as JSON on the task queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task: String,
    pub args: Value,
    #[serde(default)]
    pub retries: u32,
    /// Unix time in seconds before which the message must not run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl TaskMessage {
    pub fn new(task: impl Into<String>, args: Value) -> TaskMessage {
        TaskMessage {
            task: task.into(),
            args,
            retries: 0,
            eta: None,
            last_error: None,
        }
    }

    /// The same call again, with the failure that triggered it attached.
    pub fn retried(&self, error: &Error) -> TaskMessage {
        TaskMessage {
            task: self.task.clone(),
            args: self.args.clone(),
            retries: self.retries + 1,
            eta: None,
            last_error: Some(error.to_string()),
        }
    }

    pub fn is_due(&self, now: i64) -> bool {
        self.eta.map_or(true, |eta| eta <= now)
    }
}

fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Hands messages to whatever executes them. Implementations own the retry
/// policy.
pub trait Dispatch: Send + Sync {
    fn send(&self, message: TaskMessage) -> BoxFuture<'_, Result<()>>;
    fn retry(&self, message: TaskMessage) -> BoxFuture<'_, Result<()>>;
}

/// Exponential backoff: 1s, 2s, 4s and so on, capped at five minutes.
pub fn backoff(retries: u32) -> Duration {
    let secs = 2u64.saturating_pow(retries.saturating_sub(1));
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

/// Keeps messages on a list in the key-value store, so dispatched calls and
/// pending retries outlive the process. Consumed by [`run`].
pub struct QueueDispatcher {
    queue: DataQueue,
    max_retries: u32,
}

impl QueueDispatcher {
    pub fn new(queue: DataQueue, max_retries: u32) -> QueueDispatcher {
        QueueDispatcher { queue, max_retries }
    }
}

impl Dispatch for QueueDispatcher {
    fn send(&self, message: TaskMessage) -> BoxFuture<'_, Result<()>> {
        async move { self.queue.enqueue(&[message], None).await }.boxed()
    }

    fn retry(&self, mut message: TaskMessage) -> BoxFuture<'_, Result<()>> {
        async move {
            if message.retries > self.max_retries {
                error!(
                    task = %message.task,
                    retries = message.retries - 1,
                    last_error = ?message.last_error,
                    "Giving up on task",
                );
                return Ok(());
            }
            let delay = backoff(message.retries);
            message.eta = Some(unix_now() + delay.as_secs() as i64);
            info!(task = %message.task, retries = message.retries, ?delay, "Retrying task");
            self.send(message).await
        }
        .boxed()
    }
}

/// Executes queued messages until `shutdown` turns true or its sender goes
/// away. Each message runs on its own tokio task. Calls which are already
/// running are awaited before returning, messages still on the queue stay
/// there for the next start.
pub async fn run(
    registry: Arc<Registry>,
    ctx: Arc<TaskContext>,
    queue: DataQueue,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(queue = %queue.key, "Starting worker");
    let mut running = JoinSet::new();
    loop {
        let stop = *shutdown.borrow();
        if stop {
            break;
        }
        let started = match poll(&registry, &ctx, &queue, &mut running).await {
            Ok(started) => started,
            Err(e) => {
                error!(error = %e, "Failed to poll task queue");
                0
            }
        };
        while let Some(res) = running.try_join_next() {
            if let Err(e) = res {
                error!(error = %e, "Task panicked");
            }
        }
        if started == 0 {
            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                res = shutdown.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
            }
        }
    }
    info!(running = running.len(), "Waiting for running tasks");
    while let Some(res) = running.join_next().await {
        if let Err(e) = res {
            error!(error = %e, "Task panicked");
        }
    }
    info!("Worker stopped");
}

/// Starts the due messages of one batch and puts the others back. Returns
/// the number of started calls.
async fn poll(
    registry: &Arc<Registry>,
    ctx: &Arc<TaskContext>,
    queue: &DataQueue,
    running: &mut JoinSet<()>,
) -> Result<usize> {
    let now = unix_now();
    let mut due = vec![];
    let mut later = vec![];
    for message in queue.dequeue_results::<TaskMessage>(Some(POLL_BATCH)).await? {
        match message {
            Ok(message) if message.is_due(now) => due.push(message),
            Ok(message) => later.push(message),
            Err(e) => error!(error = %e, "Dropping undecodable task message"),
        }
    }
    queue.enqueue(&later, None).await?;
    let started = due.len();
    for message in due {
        let registry = registry.clone();
        let ctx = ctx.clone();
        running.spawn(async move {
            let task = message.task.clone();
            match registry.call(&ctx, message).await {
                Ok(_) => debug!(task = %task, "Task succeeded"),
                Err(Error::Retry { .. }) => warn!(task = %task, "Task failed, retry scheduled"),
                Err(e) => error!(task = %task, error = %e, "Task failed"),
            }
        });
    }
    Ok(started)
}
