//! Reference in-memory driver.
//!
//! Doubles as the default backend and as the worker's private
//! staging/failed store. Pop order is LIFO: the most recently pushed
//! unreserved item comes back first. State is guarded by one mutex that
//! is never held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{QueueDriver, generate_uid, normalize_channel};
use crate::codec::{Codec, Envelope, JsonCodec};
use crate::error::Result;
use crate::payload::QueueItem;

/// Persisted shape per item. The owning map key carries the channel name;
/// `reserved` is what separates poppable from in flight.
struct Record {
    uid: String,
    content: Vec<u8>,
    created_at: i64,
    reserved: bool,
}

struct Inner {
    channels: HashMap<String, Vec<Record>>,
    rng: StdRng,
}

pub struct MemoryQueue {
    inner: Mutex<Inner>,
    codec: Arc<dyn Codec>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic uid assignment, for tests and reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            inner: Mutex::new(Inner {
                channels: HashMap::new(),
                rng,
            }),
            codec: Arc::new(JsonCodec),
        }
    }

    /// Swap the storage encoding.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn decode(&self, channel: &str, record: &Record) -> Result<QueueItem> {
        let envelope = self.codec.backward(&record.content)?;
        let created_at =
            DateTime::from_timestamp(record.created_at, 0).unwrap_or_else(Utc::now);
        Ok(envelope.into_item(record.uid.clone(), channel, created_at))
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueDriver for MemoryQueue {
    async fn push(&self, item: QueueItem, channel: Option<&str>) -> Result<QueueItem> {
        let name = normalize_channel(channel.or(item.channel()));
        let content = self.codec.forward(&Envelope::from_item(&item))?;
        let created_at = item.created_at().timestamp();

        let mut inner = self.lock();
        let uid = match item.uid() {
            Some(uid) => uid.to_string(),
            None => generate_uid(&mut inner.rng),
        };
        let record = Record {
            uid: uid.clone(),
            content,
            created_at,
            reserved: false,
        };
        let records = inner.channels.entry(name.clone()).or_default();
        // Re-push of a known uid replaces the record in place.
        match records.iter_mut().find(|r| r.uid == uid) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        drop(inner);

        Ok(item.with_uid(uid).with_channel(name))
    }

    async fn pop(&self, channel: Option<&str>) -> Result<Option<QueueItem>> {
        let name = normalize_channel(channel);
        let mut inner = self.lock();
        let Some(records) = inner.channels.get_mut(&name) else {
            return Ok(None);
        };
        let Some(idx) = records.iter().rposition(|r| !r.reserved) else {
            return Ok(None);
        };
        records[idx].reserved = true;
        self.decode(&name, &records[idx]).map(Some)
    }

    async fn release(&self, uid: &str, channel: Option<&str>) -> Result<()> {
        let name = normalize_channel(channel);
        let mut inner = self.lock();
        if let Some(records) = inner.channels.get_mut(&name) {
            records.retain(|r| r.uid != uid);
        }
        Ok(())
    }

    async fn find_by_id(&self, uid: &str, channel: Option<&str>) -> Result<Option<QueueItem>> {
        let name = normalize_channel(channel);
        let inner = self.lock();
        match inner
            .channels
            .get(&name)
            .and_then(|records| records.iter().find(|r| r.uid == uid))
        {
            Some(record) => self.decode(&name, record).map(Some),
            None => Ok(None),
        }
    }

    async fn size(&self, channel: Option<&str>) -> Result<u64> {
        let name = normalize_channel(channel);
        let inner = self.lock();
        Ok(inner.channels.get(&name).map_or(0, |records| records.len() as u64))
    }

    async fn list_queues(&self) -> Result<Vec<String>> {
        let inner = self.lock();
        Ok(inner.channels.keys().cloned().collect())
    }
}
