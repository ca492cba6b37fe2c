//! Self-refilling driver for cron-like workloads.
//!
//! Wraps the in-memory driver with per-channel default payload sets: once
//! a channel runs genuinely dry its defaults are seeded back in, so
//! steady jobs come around again on every drain cycle.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{MemoryQueue, QueueDriver, normalize_channel};
use crate::error::Result;
use crate::payload::{Payload, QueueItem};

pub struct SteadyQueue {
    inner: MemoryQueue,
    defaults: HashMap<String, Vec<serde_json::Value>>,
}

impl SteadyQueue {
    /// `defaults` maps channel names to the payload contents reseeded on
    /// every refill. Keys are normalized like any other channel name.
    pub fn new(defaults: HashMap<String, Vec<serde_json::Value>>) -> Self {
        Self::with_queue(MemoryQueue::new(), defaults)
    }

    pub fn with_queue(
        inner: MemoryQueue,
        defaults: HashMap<String, Vec<serde_json::Value>>,
    ) -> Self {
        let defaults = defaults
            .into_iter()
            .map(|(channel, contents)| (normalize_channel(Some(&channel)), contents))
            .collect();
        Self { inner, defaults }
    }

    async fn refill(&self, channel: &str) -> Result<()> {
        if let Some(contents) = self.defaults.get(channel) {
            for content in contents {
                self.inner
                    .push(Payload::new(content.clone()).into(), Some(channel))
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl QueueDriver for SteadyQueue {
    async fn push(&self, item: QueueItem, channel: Option<&str>) -> Result<QueueItem> {
        self.inner.push(item, channel).await
    }

    async fn pop(&self, channel: Option<&str>) -> Result<Option<QueueItem>> {
        let name = normalize_channel(channel);
        if let Some(item) = self.inner.pop(Some(&name)).await? {
            return Ok(Some(item));
        }
        // Refill only once the channel is genuinely empty — a channel
        // that is merely fully reserved must not grow duplicates.
        if self.defaults.contains_key(&name) && self.inner.size(Some(&name)).await? == 0 {
            self.refill(&name).await?;
            return self.inner.pop(Some(&name)).await;
        }
        Ok(None)
    }

    async fn release(&self, uid: &str, channel: Option<&str>) -> Result<()> {
        self.inner.release(uid, channel).await
    }

    async fn find_by_id(&self, uid: &str, channel: Option<&str>) -> Result<Option<QueueItem>> {
        self.inner.find_by_id(uid, channel).await
    }

    async fn size(&self, channel: Option<&str>) -> Result<u64> {
        self.inner.size(channel).await
    }

    async fn list_queues(&self) -> Result<Vec<String>> {
        self.inner.list_queues().await
    }
}
