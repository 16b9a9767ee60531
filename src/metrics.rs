use std::time::Duration;
use tracing::info;

/// Destination for task metrics. Tags are `(name, value)` pairs.
pub trait Metrics: Send + Sync {
    fn timing(&self, name: &str, duration: Duration, tags: &[(&str, &str)]);
    fn gauge(&self, name: &str, value: i64, tags: &[(&str, &str)]);
    fn incr(&self, name: &str, count: i64, tags: &[(&str, &str)]);
}

/// Emits every metric as a structured log event.
pub struct TracingMetrics;

fn format_tags(tags: &[(&str, &str)]) -> String {
    tags.iter()
        .map(|(name, value)| format!("{name}:{value}"))
        .collect::<Vec<_>>()
        .join(",")
}

impl Metrics for TracingMetrics {
    fn timing(&self, name: &str, duration: Duration, tags: &[(&str, &str)]) {
        info!(
            metric = name,
            kind = "timing",
            ms = duration.as_secs_f64() * 1000.0,
            tags = %format_tags(tags),
        );
    }

    fn gauge(&self, name: &str, value: i64, tags: &[(&str, &str)]) {
        info!(metric = name, kind = "gauge", value, tags = %format_tags(tags));
    }

    fn incr(&self, name: &str, count: i64, tags: &[(&str, &str)]) {
        info!(metric = name, kind = "counter", count, tags = %format_tags(tags));
    }
}
