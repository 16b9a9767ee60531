use crate::task::TaskContext;
use crate::Result;
use std::collections::BTreeMap;

/// Reports the length of every data queue as a `queue` gauge.
pub async fn monitor_queue_size(ctx: &TaskContext) -> Result<BTreeMap<String, i64>> {
    let queues: Vec<_> = ctx.queues.all().collect();
    let replies = ctx
        .kv_pipeline(|pipe| {
            for queue in &queues {
                pipe.llen(&queue.key);
            }
            Ok(())
        })
        .await?;
    let mut res = BTreeMap::new();
    for (queue, reply) in queues.into_iter().zip(replies) {
        let size = reply.into_int()?;
        ctx.metrics.gauge(
            "queue",
            size,
            &[("queue", queue.key.as_str()), ("data_type", queue.data_type.as_str())],
        );
        res.insert(queue.key.clone(), size);
    }
    Ok(res)
}
