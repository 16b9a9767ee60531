//! Data queues: lists in the key-value store holding JSON or binary items.
//!
//! A list's TTL is reset on every append, so the remaining TTL tells how
//! long ago new data last arrived.

use crate::conf::Conf;
use crate::kv::{KvClient, Pipeline};
use crate::model::radio::Radio;
use crate::model::station_set::StationSet;
use crate::Result;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Maximum TTL of a queue list in seconds.
pub const QUEUE_TTL: i64 = 86_400;
/// Maximum time in seconds data may sit in a queue before it's processed
/// regardless of the batch size.
pub const QUEUE_MAX_AGE: i64 = 3_600;

#[derive(Clone)]
pub struct DataQueue {
    pub key: String,
    pub data_type: String,
    pub batch: usize,
    pub compress: bool,
    pub ttl: i64,
    pub max_age: i64,
    kv: KvClient,
}

impl DataQueue {
    pub fn new(key: impl Into<String>, kv: &KvClient, data_type: impl Into<String>) -> DataQueue {
        DataQueue {
            key: key.into(),
            data_type: data_type.into(),
            batch: 0,
            compress: false,
            ttl: QUEUE_TTL,
            max_age: QUEUE_MAX_AGE,
            kv: kv.clone(),
        }
    }

    pub fn batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn ttl(mut self, ttl: i64, max_age: i64) -> Self {
        self.ttl = ttl;
        self.max_age = max_age;
        self
    }

    fn encode(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        if !self.compress {
            return Ok(bytes);
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes)?;
        Ok(encoder.finish()?)
    }

    fn decode(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        if !self.compress {
            return Ok(bytes);
        }
        let mut res = Vec::new();
        GzDecoder::new(bytes.as_slice()).read_to_end(&mut res)?;
        Ok(res)
    }

    fn push(&self, pipe: &mut Pipeline, items: Vec<Vec<u8>>, batch: Option<usize>) {
        if items.is_empty() {
            return;
        }
        let batch = match batch.unwrap_or(self.batch) {
            0 => items.len(),
            batch => batch,
        };
        for chunk in items.chunks(batch) {
            pipe.rpush(&self.key, chunk.to_vec());
        }
        // expire key after it was created by rpush
        pipe.expire(&self.key, self.ttl);
    }

    /// Queues JSON items on a caller supplied pipeline. Nothing is written
    /// until the caller executes it.
    pub fn enqueue_with<T: Serialize>(
        &self,
        pipe: &mut Pipeline,
        items: &[T],
        batch: Option<usize>,
    ) -> Result<()> {
        let items = items
            .iter()
            .map(|item| self.encode(serde_json::to_vec(item)?))
            .collect::<Result<Vec<_>>>()?;
        self.push(pipe, items, batch);
        Ok(())
    }

    /// Appends JSON items in chunks of `batch`, all within one transaction.
    pub async fn enqueue<T: Serialize>(&self, items: &[T], batch: Option<usize>) -> Result<()> {
        let mut pipe = self.kv.pipeline();
        self.enqueue_with(&mut pipe, items, batch)?;
        pipe.execute(&self.kv).await?;
        Ok(())
    }

    pub fn enqueue_bytes_with(
        &self,
        pipe: &mut Pipeline,
        items: Vec<Vec<u8>>,
        batch: Option<usize>,
    ) -> Result<()> {
        let items = items
            .into_iter()
            .map(|item| self.encode(item))
            .collect::<Result<Vec<_>>>()?;
        self.push(pipe, items, batch);
        Ok(())
    }

    pub async fn enqueue_bytes(&self, items: Vec<Vec<u8>>, batch: Option<usize>) -> Result<()> {
        let mut pipe = self.kv.pipeline();
        self.enqueue_bytes_with(&mut pipe, items, batch)?;
        pipe.execute(&self.kv).await?;
        Ok(())
    }

    /// Reads and removes up to `batch` items from the head in one round
    /// trip. A batch of 0 reads nothing, the trim still runs and keeps the
    /// whole list. Items come back as stored.
    async fn dequeue_raw(&self, batch: Option<usize>) -> Result<Vec<Vec<u8>>> {
        let batch = batch.unwrap_or(self.batch) as i64;
        let mut pipe = self.kv.pipeline();
        if batch != 0 {
            pipe.lrange(&self.key, 0, batch - 1);
            pipe.ltrim(&self.key, batch, -1);
        } else {
            pipe.ltrim(&self.key, 0, -1);
        }
        let mut replies = pipe.execute(&self.kv).await?;
        if batch != 0 {
            replies.remove(0).into_items()
        } else {
            Ok(vec![])
        }
    }

    pub async fn dequeue_bytes(&self, batch: Option<usize>) -> Result<Vec<Vec<u8>>> {
        self.dequeue_raw(batch)
            .await?
            .into_iter()
            .map(|item| self.decode(item))
            .collect()
    }

    pub async fn dequeue<T: DeserializeOwned>(&self, batch: Option<usize>) -> Result<Vec<T>> {
        self.dequeue_results(batch).await?.into_iter().collect()
    }

    /// Like [`DataQueue::dequeue`], but every item is decoded on its own.
    /// The whole batch leaves the queue either way, an item that fails to
    /// decode only fails its own slot.
    pub async fn dequeue_results<T: DeserializeOwned>(
        &self,
        batch: Option<usize>,
    ) -> Result<Vec<Result<T>>> {
        Ok(self
            .dequeue_raw(batch)
            .await?
            .into_iter()
            .map(|item| Ok(serde_json::from_slice(&self.decode(item)?)?))
            .collect())
    }

    /// True if the queue holds at least `batch` items, or holds any item and
    /// saw no new data for longer than the max age.
    pub async fn ready(&self, batch: Option<usize>) -> Result<bool> {
        let batch = batch.unwrap_or(self.batch) as i64;
        let mut pipe = self.kv.pipeline();
        pipe.ttl(&self.key).llen(&self.key);
        let mut replies = pipe.execute(&self.kv).await?.into_iter();
        let ttl = replies.next().ok_or("missing ttl reply")?.into_int()?;
        let size = replies.next().ok_or("missing llen reply")?.into_int()?;
        let age = if ttl < 0 {
            None
        } else {
            Some((self.ttl - ttl).max(0))
        };
        let aged = age.map_or(false, |age| age >= self.max_age);
        Ok(size > 0 && (size >= batch || aged))
    }

    pub async fn size(&self) -> Result<i64> {
        self.kv.llen(&self.key).await
    }
}

/// The fixed set of data queues used by the tasks.
#[derive(Clone)]
pub struct DataQueues {
    queues: BTreeMap<String, DataQueue>,
}

impl DataQueues {
    pub fn configure(kv: &KvClient, conf: &Conf) -> DataQueues {
        let mut queues = vec![];
        for set in [StationSet::CELL, StationSet::OCID] {
            queues.push(DataQueue::new(set.queue, kv, "cellarea").batch(100));
        }
        for shard_id in Radio::shards() {
            queues.push(DataQueue::new(cell_queue_key(&shard_id), kv, "cell").batch(500));
        }
        DataQueues {
            queues: queues
                .into_iter()
                .map(|queue| queue.ttl(conf.queue_ttl, conf.queue_max_age))
                .map(|queue| (queue.key.clone(), queue))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Result<&DataQueue> {
        self.queues
            .get(key)
            .ok_or_else(|| format!("unknown data queue {key}").into())
    }

    pub fn all(&self) -> impl Iterator<Item = &DataQueue> {
        self.queues.values()
    }
}

pub fn cell_queue_key(shard_id: &str) -> String {
    format!("update_cell_{shard_id}")
}

#[cfg(test)]
mod test {
    use super::DataQueue;
    use crate::kv::KvClient;
    use crate::test::{mock_kv, TempDb};
    use crate::{Error, Result};
    use serde_json::{json, Value};
    use tokio::task::JoinSet;
    use tokio::test;
    use uuid::Uuid;

    async fn queue() -> DataQueue {
        DataQueue::new(Uuid::new_v4().to_string(), &mock_kv().await, "data")
    }

    #[test]
    async fn objects() -> Result<()> {
        let queue = queue().await;
        let items = vec![json!({"a": 1}), json!("b"), json!(2)];
        queue.enqueue(&items, None).await?;
        assert_eq!(items, queue.dequeue::<Value>(Some(3)).await?);
        assert_eq!(0, queue.size().await?);
        Ok(())
    }

    #[test]
    async fn binary() -> Result<()> {
        let queue = queue().await;
        let items = vec![b"\x00ab".to_vec(), b"123".to_vec()];
        queue.enqueue_bytes(items.clone(), None).await?;
        assert_eq!(items, queue.dequeue_bytes(Some(10)).await?);
        Ok(())
    }

    #[test]
    async fn compress() -> Result<()> {
        let queue = queue().await.compress(true);
        let items = vec![json!({"a": 1}), json!("b"), json!(2)];
        queue.enqueue(&items, None).await?;
        let raw = queue.kv.lrange(&queue.key, 0, 0).await?;
        assert_eq!([0x1f, 0x8b], raw[0][..2]);
        assert_eq!(items, queue.dequeue::<Value>(Some(3)).await?);
        Ok(())
    }

    #[test]
    async fn compress_binary() -> Result<()> {
        let queue = queue().await.compress(true);
        let items = vec![b"\x00ab".to_vec(), b"123".to_vec()];
        queue.enqueue_bytes(items.clone(), None).await?;
        assert_eq!(items, queue.dequeue_bytes(Some(2)).await?);
        Ok(())
    }

    #[test]
    async fn batch() -> Result<()> {
        let queue = queue().await.batch(3);
        queue.enqueue(&[1, 2, 3, 4, 5, 6], None).await?;
        assert_eq!(vec![1, 2, 3], queue.dequeue::<i64>(None).await?);
        assert_eq!(vec![4, 5], queue.dequeue::<i64>(Some(2)).await?);
        assert_eq!(vec![6], queue.dequeue::<i64>(None).await?);
        Ok(())
    }

    #[test]
    async fn chunked_enqueue() -> Result<()> {
        let queue = queue().await;
        let items: Vec<i64> = (0..10).collect();
        let mut pipe = queue.kv.pipeline();
        queue.enqueue_with(&mut pipe, &items, Some(3))?;
        // four chunks plus one expire
        assert_eq!(5, pipe.len());
        pipe.execute(&queue.kv).await?;
        assert_eq!(items, queue.dequeue::<i64>(Some(100)).await?);
        Ok(())
    }

    #[test]
    async fn dequeue_zero_keeps_everything() -> Result<()> {
        let queue = queue().await;
        queue.enqueue(&["a", "b"], None).await?;
        assert!(queue.dequeue::<String>(Some(0)).await?.is_empty());
        assert_eq!(2, queue.size().await?);
        assert_eq!(vec!["a", "b"], queue.dequeue::<String>(Some(5)).await?);
        Ok(())
    }

    #[test]
    async fn enqueue_nothing() -> Result<()> {
        let queue = queue().await;
        queue.enqueue::<Value>(&[], None).await?;
        assert_eq!(0, queue.size().await?);
        Ok(())
    }

    #[test]
    async fn pipe() -> Result<()> {
        let queue = queue().await;
        let mut pipe = queue.kv.pipeline();
        queue.enqueue_with(&mut pipe, &[1, 2, 3], None)?;
        assert_eq!(0, queue.size().await?);
        pipe.execute(&queue.kv).await?;
        assert_eq!(3, queue.size().await?);
        Ok(())
    }

    #[test]
    async fn ttl_is_refreshed() -> Result<()> {
        let queue = queue().await;
        queue.enqueue(&["a"], None).await?;
        queue.kv.expire(&queue.key, 100).await?;
        queue.enqueue(&["b"], None).await?;
        let ttl = queue.kv.ttl(&queue.key).await?;
        assert!(ttl > super::QUEUE_TTL - 5);
        Ok(())
    }

    #[test]
    async fn ready() -> Result<()> {
        let queue = queue().await.batch(4);
        assert!(!queue.ready(None).await?);
        queue.enqueue(&["a", "b", "c"], None).await?;
        assert!(!queue.ready(None).await?);
        queue.enqueue(&["d"], None).await?;
        assert!(queue.ready(None).await?);
        Ok(())
    }

    #[test]
    async fn ready_ttl() -> Result<()> {
        let queue = queue().await;
        queue.enqueue(&["a", "b", "c", "d", "e"], None).await?;
        assert!(!queue.ready(Some(10)).await?);
        // last append was more than an hour ago
        queue.kv.expire(&queue.key, 70_000).await?;
        assert!(queue.ready(Some(10)).await?);
        Ok(())
    }

    #[test]
    async fn ready_without_ttl() -> Result<()> {
        let queue = queue().await;
        queue.kv.rpush(&queue.key, vec![b"1".to_vec()]).await?;
        assert_eq!(-1, queue.kv.ttl(&queue.key).await?);
        assert!(!queue.ready(Some(10)).await?);
        assert!(queue.ready(Some(1)).await?);
        Ok(())
    }

    #[test]
    async fn size() -> Result<()> {
        let queue = queue().await;
        assert_eq!(0, queue.size().await?);
        queue.enqueue(&["a", "b"], None).await?;
        assert_eq!(2, queue.size().await?);
        queue.dequeue::<String>(Some(2)).await?;
        assert_eq!(0, queue.size().await?);
        Ok(())
    }

    #[test]
    async fn dequeue_results_keeps_good_items() -> Result<()> {
        let queue = queue().await;
        queue
            .enqueue_bytes(
                vec![b"1".to_vec(), b"\xffnot json".to_vec(), b"3".to_vec()],
                None,
            )
            .await?;
        let items = queue.dequeue_results::<i64>(Some(10)).await?;
        assert_eq!(3, items.len());
        assert_eq!(1, *items[0].as_ref().map_err(|e| e.to_string())?);
        assert!(items[1].is_err());
        assert_eq!(3, *items[2].as_ref().map_err(|e| e.to_string())?);
        assert_eq!(0, queue.size().await?);
        Ok(())
    }

    #[test]
    async fn dequeue_results_bad_gzip() -> Result<()> {
        let queue = queue().await.compress(true);
        queue.enqueue(&[1], None).await?;
        queue.kv.rpush(&queue.key, vec![b"plain".to_vec()]).await?;
        let items = queue.dequeue_results::<i64>(Some(10)).await?;
        assert_eq!(2, items.len());
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
        Ok(())
    }

    #[test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_dequeue() -> Result<()> {
        let db = TempDb::new();
        let kv = KvClient::open(&db.path).await?;
        let queue = DataQueue::new("items", &kv, "data");
        let items: Vec<i64> = (0..400).collect();
        queue.enqueue(&items, None).await?;
        let mut workers = JoinSet::new();
        for _ in 0..8 {
            let queue = queue.clone();
            workers.spawn(async move {
                let mut taken = vec![];
                for _ in 0..10 {
                    taken.extend(queue.dequeue::<i64>(Some(10)).await?);
                }
                Ok::<_, Error>(taken)
            });
        }
        let mut taken = vec![];
        while let Some(res) = workers.join_next().await {
            taken.extend(res.map_err(|e| e.to_string())??);
        }
        taken.sort();
        assert_eq!(items, taken);
        assert_eq!(0, queue.size().await?);
        Ok(())
    }
}
