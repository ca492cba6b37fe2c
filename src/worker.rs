//! Worker: turns reservations into a safe execute/retry/fail cycle.
//!
//! One logical thread of control. The worker pops from an aggregate
//! dispatcher, stages the reservation into a private driver, releases the
//! origin copy, and only then executes. Failures feed a reserved "failed"
//! channel that the dispatcher revisits preferentially; that channel is
//! itself just another driver.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{HandlerError, Result};
use crate::event::{WorkerEvent, WorkerObserver};
use crate::payload::{FailedPayload, QueueItem};
use crate::queue::{AggregateQueue, MemoryQueue, QueueDriver};

/// Channel the staged copy of an in-flight item lives in.
pub const PROCESSING_CHANNEL: &str = "processing";
/// Dispatcher channel failed payloads are requeued into.
pub const FAILED_CHANNEL: &str = "failed";
/// Failed work outweighs fresh work so it is revisited preferentially.
const FAILED_WEIGHT: f64 = 0.9;

const BACKOFF_START: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Payload executor plugged in at worker construction.
#[async_trait::async_trait]
pub trait PayloadHandler: Send + Sync {
    /// Execute one payload's content. [`HandlerError::Invalid`] marks the
    /// input itself as unprocessable and is never retried; any other
    /// failure requeues the payload with a bumped retry counter.
    async fn handle(&self, content: &serde_json::Value)
    -> std::result::Result<(), HandlerError>;
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Attempts allowed per payload, and per transient I/O call, before
    /// giving up.
    pub max_tries: u32,
    /// Pause between bounded-retry attempts on transient I/O.
    pub blocking_interval: Duration,
    /// Breather between consecutive payloads within one drain.
    pub sleep: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_tries: 3,
            blocking_interval: Duration::from_secs(3),
            sleep: Duration::ZERO,
        }
    }
}

/// Outcome of one execution attempt, consumed by a single resolution
/// switch.
enum Resolution {
    Succeeded,
    /// Recoverable failure: requeue with a bumped counter.
    Retrying {
        payload: FailedPayload,
        reason: String,
    },
    /// Retry ceiling crossed. The item is dropped deliberately.
    Exhausted,
    /// The input can never succeed. Parked for operator inspection.
    Fatal { error: String },
}

pub struct Worker {
    id: String,
    queue: AggregateQueue,
    builtin: Arc<dyn QueueDriver>,
    handler: Arc<dyn PayloadHandler>,
    observers: Vec<Arc<dyn WorkerObserver>>,
    config: WorkerConfig,
    failed_registered: bool,
    /// Uids that failed fatally in this process. Left in flight in the
    /// failed channel rather than re-executed.
    poisoned: Mutex<HashSet<String>>,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queue: AggregateQueue,
        handler: Arc<dyn PayloadHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            builtin: Arc::new(MemoryQueue::new()),
            handler,
            observers: Vec::new(),
            config: WorkerConfig::default(),
            failed_registered: false,
            poisoned: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Swap the private staging/failed driver, e.g. for a durable store
    /// that recovery tooling can inspect after a crash.
    pub fn with_builtin_queue(mut self, driver: Arc<dyn QueueDriver>) -> Self {
        self.builtin = driver;
        self
    }

    pub fn observe(mut self, observer: Arc<dyn WorkerObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The dispatcher, for seeding and inspection between drains.
    pub fn queue(&self) -> &AggregateQueue {
        &self.queue
    }

    fn emit(&self, event: WorkerEvent) {
        for observer in &self.observers {
            observer.notify(&event);
        }
    }

    /// The failed channel is itself a driver, registered once against the
    /// dispatcher so requeued work flows back through weighted selection.
    /// An already-registered failed channel (e.g. a durable one supplied
    /// by the caller) is used as-is.
    fn ensure_failed_channel(&mut self) -> Result<()> {
        if self.failed_registered {
            return Ok(());
        }
        if !self.queue.has_queue(FAILED_CHANNEL) {
            self.queue
                .add_queue(FAILED_CHANNEL, Arc::clone(&self.builtin), FAILED_WEIGHT)?;
        }
        self.failed_registered = true;
        Ok(())
    }

    /// Drain the dispatcher: reserve, stage, execute, resolve, repeat
    /// until a pop comes back empty. Returns how many payloads ran.
    pub async fn run_until_empty(&mut self) -> Result<usize> {
        self.ensure_failed_channel()?;
        let mut processed = 0;
        loop {
            let popped = retry_io(&self.config, || self.queue.pop(None)).await?;
            let Some(origin) = popped else { break };

            if self.is_poisoned(&origin) {
                // Stays reserved at the origin: present for inspection,
                // never re-executed by this process.
                continue;
            }

            self.process_one(origin).await?;
            processed += 1;

            if !self.config.sleep.is_zero() {
                sleep(self.config.sleep).await;
            }
        }
        debug!(worker = %self.id, processed, "queue drained");
        Ok(processed)
    }

    /// Keep draining. Empty drains back off with a doubling, capped
    /// sleep; a non-empty drain resets the backoff and counts toward
    /// `max_executions` when given.
    pub async fn run_forever(&mut self, max_executions: Option<u64>) -> Result<()> {
        let mut drains = 0u64;
        let mut backoff = BACKOFF_START;
        loop {
            let processed = self.run_until_empty().await?;
            if processed == 0 {
                sleep(backoff).await;
                backoff = (backoff * 2).min(BACKOFF_CAP);
                continue;
            }
            backoff = BACKOFF_START;
            drains += 1;
            if let Some(max) = max_executions
                && drains >= max
            {
                info!(worker = %self.id, drains, "execution ceiling reached");
                return Ok(());
            }
        }
    }

    fn is_poisoned(&self, item: &QueueItem) -> bool {
        match item.uid() {
            Some(uid) => self
                .poisoned
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(uid),
            None => false,
        }
    }

    fn poison(&self, item: &QueueItem) {
        if let Some(uid) = item.uid() {
            self.poisoned
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(uid.to_string());
        }
    }

    /// Two-phase handoff, then execute and resolve.
    ///
    /// The staged copy exists before the origin copy is released: dying
    /// between reservation and staging leaves the item poppable at the
    /// origin; once staged, the builtin driver records that this worker
    /// owns the item.
    async fn process_one(&self, origin: QueueItem) -> Result<()> {
        let staged = retry_io(&self.config, || {
            self.builtin.push(origin.clone(), Some(PROCESSING_CHANNEL))
        })
        .await?;

        if let Some(uid) = origin.uid() {
            let released =
                retry_io(&self.config, || self.queue.release(uid, origin.channel())).await;
            if let Err(err) = released {
                // The origin copy survives, so the item stays deliverable;
                // drop our stage and surface the failure.
                self.release_staged(&staged).await;
                return Err(err);
            }
        }

        let resolution = self.perform(&staged).await;
        let result = self.resolve(&staged, resolution).await;
        self.release_staged(&staged).await;
        result
    }

    async fn perform(&self, item: &QueueItem) -> Resolution {
        if let QueueItem::Failed(failed) = item
            && failed.retry_count() > self.config.max_tries
        {
            return Resolution::Exhausted;
        }

        self.emit(WorkerEvent::PayloadReceived {
            worker: self.id.clone(),
            content: item.content().clone(),
            item: item.clone(),
        });

        match self.handler.handle(item.content()).await {
            Ok(()) => Resolution::Succeeded,
            Err(HandlerError::Invalid(reason)) => Resolution::Fatal { error: reason },
            Err(HandlerError::Failed(source)) => {
                let payload = match item.clone() {
                    QueueItem::Failed(failed) => failed,
                    QueueItem::Queued(queued) => FailedPayload::new(queued),
                };
                Resolution::Retrying {
                    payload,
                    reason: source.to_string(),
                }
            }
        }
    }

    async fn resolve(&self, item: &QueueItem, resolution: Resolution) -> Result<()> {
        match resolution {
            Resolution::Succeeded => {
                self.emit(WorkerEvent::PayloadSucceeded {
                    worker: self.id.clone(),
                    item: item.clone(),
                });
            }
            Resolution::Retrying { payload, reason } => {
                let bumped = payload.incremented().with_channel(FAILED_CHANNEL);
                retry_io(&self.config, || {
                    self.queue
                        .push(QueueItem::Failed(bumped.clone()), Some(FAILED_CHANNEL))
                })
                .await?;
                self.emit(WorkerEvent::PayloadRetry {
                    worker: self.id.clone(),
                    payload: bumped,
                    reason,
                });
            }
            Resolution::Exhausted => {
                let error = format!(
                    "max tries ({}) exceeded after {} retries",
                    self.config.max_tries,
                    item.retry_count()
                );
                self.emit(WorkerEvent::PayloadFailure {
                    worker: self.id.clone(),
                    item: item.clone(),
                    error,
                });
            }
            Resolution::Fatal { error } => {
                // The raw item goes back once, without retry bookkeeping,
                // and is parked so this process never re-executes it.
                let raw = QueueItem::Queued(item.clone().into_queued());
                self.poison(&raw);
                if let Err(err) = self.queue.push(raw, Some(FAILED_CHANNEL)).await {
                    warn!(worker = %self.id, error = %err, "could not requeue fatally failed payload");
                }
                self.emit(WorkerEvent::PayloadFailure {
                    worker: self.id.clone(),
                    item: item.clone(),
                    error,
                });
            }
        }
        Ok(())
    }

    /// Best-effort: the staged copy only matters while we own the item.
    async fn release_staged(&self, staged: &QueueItem) {
        if let Some(uid) = staged.uid() {
            if let Err(err) = self.builtin.release(uid, Some(PROCESSING_CHANNEL)).await {
                warn!(worker = %self.id, uid, error = %err, "failed to release staged copy");
            }
        }
    }
}

/// Bounded retry for transient I/O: up to `max_tries` attempts with a
/// blocking pause in between. Anything other than a read/write error
/// propagates immediately.
async fn retry_io<T, F, Fut>(config: &WorkerConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_io() && attempt < config.max_tries => {
                debug!(attempt, error = %err, "transient queue error, backing off");
                sleep(config.blocking_interval).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_config() -> WorkerConfig {
        WorkerConfig {
            max_tries: 3,
            blocking_interval: Duration::ZERO,
            sleep: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn retry_io_retries_transient_errors_up_to_the_ceiling() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_io(&quick_config(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(Error::Read(format!("transient {n}"))) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_io_recovers_when_an_attempt_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_io(&quick_config(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::Write("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn retry_io_does_not_retry_config_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_io(&quick_config(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Config("bad setup".into())) }
        })
        .await;

        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
