use super::context::TaskContext;
use super::worker::TaskMessage;
use super::TaskDef;
use crate::{Error, Result};
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of a single task invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Succeeded,
    /// Failed and handed back to the dispatcher for another attempt.
    Retried,
    /// Failed without a retry.
    Raised,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Raised)
    }
}

/// Runs one invocation of a task body.
///
/// The duration is always recorded under the `task` timer, tagged with the
/// short task name. A failure is captured by the error sink. Outside of
/// testing, tasks with auto retry are sent back to the dispatcher with the
/// failure attached and [`Error::Retry`] is returned. Otherwise the original
/// error is returned.
pub async fn execute<'a>(
    def: &TaskDef,
    ctx: &'a TaskContext,
    message: &TaskMessage,
    body: BoxFuture<'a, Result<Value>>,
) -> (TaskState, Result<Value>) {
    let shortname = def.shortname();
    debug!(task = %shortname, retries = message.retries, "Running task");
    let started_at = Instant::now();
    let res = body.await;
    ctx.metrics
        .timing("task", started_at.elapsed(), &[("task", shortname.as_str())]);
    let error = match res {
        Ok(value) => return (TaskState::Succeeded, Ok(value)),
        Err(e) => e,
    };
    ctx.errors.capture(def.name, &error);
    if !def.auto_retry || ctx.conf.testing {
        return (TaskState::Raised, Err(error));
    }
    let cause = error.to_string();
    if let Err(e) = ctx.dispatcher.retry(message.retried(&error)).await {
        warn!(task = %shortname, error = %e, "Failed to schedule retry");
        return (TaskState::Raised, Err(error));
    }
    (
        TaskState::Retried,
        Err(Error::Retry {
            task: def.name.to_string(),
            cause,
        }),
    )
}
