//! A small list store with Redis semantics, kept in its own SQLite file.
//!
//! Only the commands the data queues need are implemented. Every command
//! runs inside a transaction, a [`Pipeline`] runs all of its commands
//! inside a single one. Transactions take the write lock up front so that
//! concurrent read-then-write pipelines wait for each other instead of
//! failing with SQLITE_BUSY.

pub mod blocking_queries;

use crate::{Error, Result};
use deadpool_sqlite::{Config, Pool, Runtime};
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    RPush { key: String, values: Vec<Vec<u8>> },
    LRange { key: String, start: i64, stop: i64 },
    LTrim { key: String, start: i64, stop: i64 },
    LLen { key: String },
    Expire { key: String, seconds: i64 },
    Ttl { key: String },
    Delete { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Int(i64),
    Bool(bool),
    Items(Vec<Vec<u8>>),
}

impl Reply {
    pub fn into_int(self) -> Result<i64> {
        match self {
            Reply::Int(value) => Ok(value),
            other => Err(Error::Generic(format!("expected integer reply, got {other:?}"))),
        }
    }

    pub fn into_items(self) -> Result<Vec<Vec<u8>>> {
        match self {
            Reply::Items(items) => Ok(items),
            other => Err(Error::Generic(format!("expected list reply, got {other:?}"))),
        }
    }
}

impl Command {
    fn run(&self, conn: &Connection) -> Result<Reply> {
        Ok(match self {
            Command::RPush { key, values } => Reply::Int(blocking_queries::rpush(key, values, conn)?),
            Command::LRange { key, start, stop } => {
                Reply::Items(blocking_queries::lrange(key, *start, *stop, conn)?)
            }
            Command::LTrim { key, start, stop } => {
                blocking_queries::ltrim(key, *start, *stop, conn)?;
                Reply::Ok
            }
            Command::LLen { key } => Reply::Int(blocking_queries::llen(key, conn)?),
            Command::Expire { key, seconds } => {
                Reply::Bool(blocking_queries::expire(key, *seconds, conn)?)
            }
            Command::Ttl { key } => Reply::Int(blocking_queries::ttl(key, conn)?),
            Command::Delete { key } => Reply::Int(blocking_queries::delete(key, conn)?),
        })
    }
}

/// Buffered commands executed atomically. Dropping a pipeline without
/// calling [`Pipeline::execute`] discards everything queued on it.
#[derive(Debug, Default)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    pub fn new() -> Pipeline {
        Pipeline::default()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn rpush(&mut self, key: &str, values: Vec<Vec<u8>>) -> &mut Self {
        self.push(Command::RPush {
            key: key.into(),
            values,
        })
    }

    pub fn lrange(&mut self, key: &str, start: i64, stop: i64) -> &mut Self {
        self.push(Command::LRange {
            key: key.into(),
            start,
            stop,
        })
    }

    pub fn ltrim(&mut self, key: &str, start: i64, stop: i64) -> &mut Self {
        self.push(Command::LTrim {
            key: key.into(),
            start,
            stop,
        })
    }

    pub fn llen(&mut self, key: &str) -> &mut Self {
        self.push(Command::LLen { key: key.into() })
    }

    pub fn expire(&mut self, key: &str, seconds: i64) -> &mut Self {
        self.push(Command::Expire {
            key: key.into(),
            seconds,
        })
    }

    pub fn ttl(&mut self, key: &str) -> &mut Self {
        self.push(Command::Ttl { key: key.into() })
    }

    pub fn delete(&mut self, key: &str) -> &mut Self {
        self.push(Command::Delete { key: key.into() })
    }

    fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub async fn execute(self, client: &KvClient) -> Result<Vec<Reply>> {
        if self.commands.is_empty() {
            return Ok(vec![]);
        }
        let commands = self.commands;
        client
            .pool
            .get()
            .await?
            .interact(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let replies = commands
                    .iter()
                    .map(|command| command.run(&tx))
                    .collect::<Result<Vec<_>>>()?;
                tx.commit()?;
                Ok(replies)
            })
            .await?
    }
}

#[derive(Clone)]
pub struct KvClient {
    pool: Arc<Pool>,
}

impl KvClient {
    pub async fn open(path: impl AsRef<Path>) -> Result<KvClient> {
        let pool = Config::new(path.as_ref()).create_pool(Runtime::Tokio1)?;
        pool.get()
            .await?
            .interact(|conn| {
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "synchronous", "NORMAL")
            })
            .await??;
        KvClient::from_pool(Arc::new(pool)).await
    }

    pub async fn from_pool(pool: Arc<Pool>) -> Result<KvClient> {
        pool.get()
            .await?
            .interact(|conn| blocking_queries::migrate(conn))
            .await??;
        Ok(KvClient { pool })
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new()
    }

    async fn single(&self, command: Command) -> Result<Reply> {
        let mut pipe = self.pipeline();
        pipe.push(command);
        pipe.execute(self)
            .await?
            .pop()
            .ok_or_else(|| Error::Generic("empty pipeline reply".into()))
    }

    pub async fn rpush(&self, key: &str, values: Vec<Vec<u8>>) -> Result<i64> {
        self.single(Command::RPush {
            key: key.into(),
            values,
        })
        .await?
        .into_int()
    }

    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        self.single(Command::LRange {
            key: key.into(),
            start,
            stop,
        })
        .await?
        .into_items()
    }

    pub async fn llen(&self, key: &str) -> Result<i64> {
        self.single(Command::LLen { key: key.into() })
            .await?
            .into_int()
    }

    pub async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        match self
            .single(Command::Expire {
                key: key.into(),
                seconds,
            })
            .await?
        {
            Reply::Bool(res) => Ok(res),
            other => Err(Error::Generic(format!("expected bool reply, got {other:?}"))),
        }
    }

    pub async fn ttl(&self, key: &str) -> Result<i64> {
        self.single(Command::Ttl { key: key.into() })
            .await?
            .into_int()
    }

    pub async fn delete(&self, key: &str) -> Result<i64> {
        self.single(Command::Delete { key: key.into() })
            .await?
            .into_int()
    }
}
