use radiomap::conf::Conf;
use radiomap::error_sink::{ErrorSink, LogErrorSink, WebhookErrorSink};
use radiomap::kv::KvClient;
use radiomap::metrics::TracingMetrics;
use radiomap::queue::{DataQueue, DataQueues};
use radiomap::task::worker::{QueueDispatcher, TASK_QUEUE};
use radiomap::task::{beat, worker, Registry, TaskContext};
use radiomap::{data, db, log, Error, Result};
use std::env;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let conf = Conf::from_env()?;
    log::init_logging();

    let args: Vec<String> = env::args().collect();

    let command = match args.get(1) {
        Some(some) => some,
        None => Err(Error::Config("No actions passed".into()))?,
    };

    match command.as_str() {
        "migrate" => {
            let mut conn = db::open_connection(&conf.db_path)?;
            db::migration::run(&mut conn)?;
        }
        "worker" => run_worker(conf).await?,
        first_arg => Err(Error::Config(format!("Unknown command: {first_arg}")))?,
    }

    Ok(())
}

async fn run_worker(conf: Conf) -> Result<()> {
    let pool = Arc::new(db::open_pool(&conf.db_path)?);
    let kv = KvClient::open(&conf.kv_path).await?;
    let errors: Arc<dyn ErrorSink> = match &conf.error_webhook {
        Some(url) => Arc::new(WebhookErrorSink::new(url.clone())),
        None => Arc::new(LogErrorSink),
    };
    let task_queue =
        DataQueue::new(TASK_QUEUE, &kv, "task").ttl(conf.queue_ttl, conf.queue_max_age);
    let dispatcher = Arc::new(QueueDispatcher::new(task_queue.clone(), conf.max_retries));

    let mut registry = Registry::new();
    data::tasks::register_all(&mut registry)?;
    let entries = registry.beat_config()?;

    let ctx = TaskContext {
        queues: DataQueues::configure(&kv, &conf),
        conf,
        pool,
        kv,
        errors,
        metrics: Arc::new(TracingMetrics),
        dispatcher: dispatcher.clone(),
    };

    let (shutdown, shutdown_rx) = watch::channel(false);
    let running = tokio::spawn(worker::run(
        Arc::new(registry),
        Arc::new(ctx),
        task_queue,
        shutdown_rx,
    ));

    tokio::select! {
        _ = beat::run(entries, dispatcher) => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Shutting down");
        }
    }
    // the worker may already be gone, in which case there is nobody to tell
    let _ = shutdown.send(true);
    running
        .await
        .map_err(|e| Error::Generic(format!("worker failed: {e}")))
}
