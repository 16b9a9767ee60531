use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber. Human readable output in debug builds,
/// JSON lines in release builds.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if cfg!(debug_assertions) {
        registry.with(fmt::layer()).init();
    } else {
        registry.with(fmt::layer().json().without_time()).init();
    }
}
