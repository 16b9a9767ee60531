pub mod conf;
pub mod constants;
pub mod data;
pub mod db;
pub mod error;
pub mod error_sink;
pub mod geocalc;
pub mod kv;
pub mod log;
pub mod metrics;
pub mod model;
pub mod queue;
pub mod task;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
