use crate::queue::{QUEUE_MAX_AGE, QUEUE_TTL};
use crate::{Error, Result};
use std::fs::create_dir_all;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

const VAR_TESTING: &str = "RADIOMAP_TESTING";
const VAR_DB: &str = "RADIOMAP_DB";
const VAR_KV: &str = "RADIOMAP_KV";
const VAR_QUEUE_TTL: &str = "RADIOMAP_QUEUE_TTL_SECS";
const VAR_QUEUE_MAX_AGE: &str = "RADIOMAP_QUEUE_MAX_AGE_SECS";
const VAR_MAX_RETRIES: &str = "RADIOMAP_MAX_RETRIES";
const VAR_ERROR_WEBHOOK: &str = "RADIOMAP_ERROR_WEBHOOK";

#[derive(Debug, Clone)]
pub struct Conf {
    /// Tasks fail right away instead of being retried, and task arguments
    /// are round-tripped through the wire format before each call.
    pub testing: bool,
    pub db_path: PathBuf,
    pub kv_path: PathBuf,
    pub queue_ttl: i64,
    pub queue_max_age: i64,
    pub max_retries: u32,
    pub error_webhook: Option<Url>,
}

impl Conf {
    pub fn from_env() -> Result<Conf> {
        Conf::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Conf> {
        let db_path = match var(VAR_DB) {
            Some(path) => PathBuf::from(path),
            None => data_dir_file("radiomap.db")?,
        };
        let kv_path = match var(VAR_KV) {
            Some(path) => PathBuf::from(path),
            None => data_dir_file("kv.db")?,
        };
        let error_webhook = match var(VAR_ERROR_WEBHOOK) {
            Some(url) if !url.is_empty() => Some(
                Url::parse(&url)
                    .map_err(|e| Error::Config(format!("{VAR_ERROR_WEBHOOK}: {e}")))?,
            ),
            _ => None,
        };
        Ok(Conf {
            testing: parse_bool(VAR_TESTING, var(VAR_TESTING))?,
            db_path,
            kv_path,
            queue_ttl: parse(VAR_QUEUE_TTL, var(VAR_QUEUE_TTL), QUEUE_TTL)?,
            queue_max_age: parse(VAR_QUEUE_MAX_AGE, var(VAR_QUEUE_MAX_AGE), QUEUE_MAX_AGE)?,
            max_retries: parse(VAR_MAX_RETRIES, var(VAR_MAX_RETRIES), 3)?,
            error_webhook,
        })
    }
}

fn parse<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{name}: can't parse {value:?}"))),
        None => Ok(default),
    }
}

fn parse_bool(name: &str, value: Option<String>) -> Result<bool> {
    match value.as_deref().map(str::trim) {
        None | Some("") | Some("0") | Some("false") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some(other) => Err(Error::Config(format!("{name}: not a boolean: {other:?}"))),
    }
}

pub fn data_dir_file(file_name: &str) -> Result<PathBuf> {
    #[allow(deprecated)]
    let data_dir = std::env::home_dir()
        .ok_or("Home directory does not exist")?
        .join(".local/share/radiomap");
    if !data_dir.exists() {
        create_dir_all(&data_dir)?;
    }
    Ok(data_dir.join(file_name))
}
