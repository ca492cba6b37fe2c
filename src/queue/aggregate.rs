//! Weighted aggregate dispatcher: many named drivers behind one contract.
//!
//! Scoped calls delegate straight to the named channel's driver. Unscoped
//! push/pop draw a channel by weight — sampling without replacement across
//! one call, so an empty or declining channel drops out and the draw moves
//! on until something answers or every candidate is spent.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use super::{QueueDriver, normalize_channel};
use crate::alias::AliasTable;
use crate::error::{Error, Result};
use crate::payload::QueueItem;

struct Channel {
    name: String,
    driver: Arc<dyn QueueDriver>,
    weight: f64,
}

pub struct AggregateQueue {
    /// Registration order, preserved for scatter operations.
    channels: Vec<Channel>,
    /// Alias table over the full registration snapshot, rebuilt only when
    /// a channel is added. Draws over a shrunken candidate set build a
    /// throwaway table instead.
    table: Option<AliasTable>,
    rng: Mutex<StdRng>,
}

impl AggregateQueue {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic channel selection, for tests and reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            channels: Vec::new(),
            table: None,
            rng: Mutex::new(rng),
        }
    }

    /// Register a driver under a channel name. Registering a name twice is
    /// a configuration error, as is a weight that is not positive and
    /// finite.
    pub fn add_queue(
        &mut self,
        channel: &str,
        driver: Arc<dyn QueueDriver>,
        weight: f64,
    ) -> Result<()> {
        let name = normalize_channel(Some(channel));
        if self.channels.iter().any(|c| c.name == name) {
            return Err(Error::Config(format!(
                "channel ({channel}) is already registered"
            )));
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(Error::Config(format!(
                "channel ({channel}) weight must be positive and finite"
            )));
        }
        self.channels.push(Channel { name, driver, weight });
        let weights: Vec<f64> = self.channels.iter().map(|c| c.weight).collect();
        self.table = Some(AliasTable::new(&weights)?);
        Ok(())
    }

    pub fn has_queue(&self, channel: &str) -> bool {
        let name = normalize_channel(Some(channel));
        self.channels.iter().any(|c| c.name == name)
    }

    fn driver_for(&self, channel: &str) -> Result<&Channel> {
        let name = normalize_channel(Some(channel));
        self.channels
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::Read(format!("channel ({channel}) is not accessible")))
    }

    /// Draw one candidate position, weight-proportionally. The first draw
    /// of a call covers every registered channel and reuses the cached
    /// snapshot table in O(1); redraws over a shrunken candidate set pay
    /// for a fresh table.
    fn draw(&self, candidates: &[usize]) -> Result<usize> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if candidates.len() == self.channels.len()
            && let Some(table) = &self.table
        {
            return Ok(table.sample(&mut *rng));
        }
        let weights: Vec<f64> = candidates
            .iter()
            .map(|&idx| self.channels[idx].weight)
            .collect();
        let table = AliasTable::new(&weights)?;
        Ok(table.sample(&mut *rng))
    }

    async fn pop_any(&self) -> Result<Option<QueueItem>> {
        let mut candidates: Vec<usize> = (0..self.channels.len()).collect();
        while !candidates.is_empty() {
            let pick = self.draw(&candidates)?;
            let idx = candidates.swap_remove(pick);
            let channel = &self.channels[idx];
            if let Some(item) = channel.driver.pop(Some(&channel.name)).await? {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    async fn push_any(&self, item: QueueItem) -> Result<QueueItem> {
        let mut candidates: Vec<usize> = (0..self.channels.len()).collect();
        let mut last_err = None;
        while !candidates.is_empty() {
            let pick = self.draw(&candidates)?;
            let idx = candidates.swap_remove(pick);
            let channel = &self.channels[idx];
            match channel.driver.push(item.clone(), Some(&channel.name)).await {
                Ok(stamped) => return Ok(stamped),
                Err(err) if err.is_io() => {
                    debug!(channel = %channel.name, error = %err, "channel declined push, redrawing");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Write("no channel accepted the payload".into())))
    }
}

impl Default for AggregateQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueDriver for AggregateQueue {
    async fn push(&self, item: QueueItem, channel: Option<&str>) -> Result<QueueItem> {
        match channel {
            Some(name) => {
                let channel = self.driver_for(name)?;
                channel.driver.push(item, Some(&channel.name)).await
            }
            None => self.push_any(item).await,
        }
    }

    async fn pop(&self, channel: Option<&str>) -> Result<Option<QueueItem>> {
        match channel {
            Some(name) => {
                let channel = self.driver_for(name)?;
                channel.driver.pop(Some(&channel.name)).await
            }
            None => self.pop_any().await,
        }
    }

    async fn release(&self, uid: &str, channel: Option<&str>) -> Result<()> {
        match channel {
            Some(name) => {
                let channel = self.driver_for(name)?;
                channel.driver.release(uid, Some(&channel.name)).await
            }
            None => {
                // Scatter in registration order; the first channel that
                // knows the uid owns the release.
                for channel in &self.channels {
                    if channel
                        .driver
                        .find_by_id(uid, Some(&channel.name))
                        .await?
                        .is_some()
                    {
                        return channel.driver.release(uid, Some(&channel.name)).await;
                    }
                }
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, uid: &str, channel: Option<&str>) -> Result<Option<QueueItem>> {
        match channel {
            Some(name) => {
                let channel = self.driver_for(name)?;
                channel.driver.find_by_id(uid, Some(&channel.name)).await
            }
            None => {
                for channel in &self.channels {
                    if let Some(item) =
                        channel.driver.find_by_id(uid, Some(&channel.name)).await?
                    {
                        return Ok(Some(item));
                    }
                }
                Ok(None)
            }
        }
    }

    async fn size(&self, channel: Option<&str>) -> Result<u64> {
        match channel {
            Some(name) => {
                let channel = self.driver_for(name)?;
                channel.driver.size(Some(&channel.name)).await
            }
            None => {
                let mut total = 0;
                for channel in &self.channels {
                    total += channel.driver.size(Some(&channel.name)).await?;
                }
                Ok(total)
            }
        }
    }

    async fn list_queues(&self) -> Result<Vec<String>> {
        Ok(self.channels.iter().map(|c| c.name.clone()).collect())
    }
}
