//! Immutable payload value types.
//!
//! A payload starts as bare content, gains queue metadata when a driver
//! persists it, and grows a retry counter once execution has failed.
//! Every `with_*` mutator yields a fresh value; nothing here shares
//! mutable state with anything else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Opaque producer-supplied content, not yet queued. The crate never
/// interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    content: serde_json::Value,
}

impl Payload {
    pub fn new(content: serde_json::Value) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &serde_json::Value {
        &self.content
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }
}

// ---------------------------------------------------------------------------
// QueuedPayload
// ---------------------------------------------------------------------------

/// A payload plus the metadata a driver stamps on it at push time.
///
/// `uid` and `channel` stay `None` until a driver persists the value.
/// `created_at` is fixed at construction and survives every mutation and
/// re-push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedPayload {
    payload: Payload,
    uid: Option<String>,
    channel: Option<String>,
    created_at: DateTime<Utc>,
}

impl QueuedPayload {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            uid: None,
            channel: None,
            created_at: Utc::now(),
        }
    }

    /// Rehydrate a persisted record. Used by drivers when popping.
    pub fn restored(
        payload: Payload,
        uid: impl Into<String>,
        channel: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            payload,
            uid: Some(uid.into()),
            channel: Some(channel.into()),
            created_at,
        }
    }

    pub fn content(&self) -> &serde_json::Value {
        self.payload.content()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.payload = self.payload.with_content(content);
        self
    }
}

// ---------------------------------------------------------------------------
// FailedPayload
// ---------------------------------------------------------------------------

/// A queued payload that has failed execution at least once.
///
/// Wrapping is transparent: every accessor delegates to the inner value,
/// and the retry counter travels inside the codec envelope, so drivers
/// that only understand queued payloads still round-trip it intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPayload {
    inner: QueuedPayload,
    retry_count: u32,
}

impl FailedPayload {
    pub fn new(inner: QueuedPayload) -> Self {
        Self {
            inner,
            retry_count: 0,
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// The counter moves up by exactly one per failed execution attempt.
    pub fn incremented(mut self) -> Self {
        self.retry_count += 1;
        self
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn inner(&self) -> &QueuedPayload {
        &self.inner
    }

    /// Drop the failure wrapper, recovering the raw queued payload.
    pub fn into_inner(self) -> QueuedPayload {
        self.inner
    }

    pub fn content(&self) -> &serde_json::Value {
        self.inner.content()
    }

    pub fn uid(&self) -> Option<&str> {
        self.inner.uid()
    }

    pub fn channel(&self) -> Option<&str> {
        self.inner.channel()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at()
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.inner = self.inner.with_uid(uid);
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.inner = self.inner.with_channel(channel);
        self
    }
}

// ---------------------------------------------------------------------------
// QueueItem
// ---------------------------------------------------------------------------

/// What drivers exchange: a first-attempt payload or one carrying retry
/// history. The closed set keeps the failure wrapper visible to the
/// worker without widening the driver contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueueItem {
    Failed(FailedPayload),
    Queued(QueuedPayload),
}

impl QueueItem {
    pub fn content(&self) -> &serde_json::Value {
        match self {
            QueueItem::Queued(q) => q.content(),
            QueueItem::Failed(f) => f.content(),
        }
    }

    pub fn uid(&self) -> Option<&str> {
        match self {
            QueueItem::Queued(q) => q.uid(),
            QueueItem::Failed(f) => f.uid(),
        }
    }

    pub fn channel(&self) -> Option<&str> {
        match self {
            QueueItem::Queued(q) => q.channel(),
            QueueItem::Failed(f) => f.channel(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            QueueItem::Queued(q) => q.created_at(),
            QueueItem::Failed(f) => f.created_at(),
        }
    }

    /// Zero for items that have never failed.
    pub fn retry_count(&self) -> u32 {
        match self {
            QueueItem::Queued(_) => 0,
            QueueItem::Failed(f) => f.retry_count(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, QueueItem::Failed(_))
    }

    pub fn with_uid(self, uid: impl Into<String>) -> Self {
        match self {
            QueueItem::Queued(q) => QueueItem::Queued(q.with_uid(uid)),
            QueueItem::Failed(f) => QueueItem::Failed(f.with_uid(uid)),
        }
    }

    pub fn with_channel(self, channel: impl Into<String>) -> Self {
        match self {
            QueueItem::Queued(q) => QueueItem::Queued(q.with_channel(channel)),
            QueueItem::Failed(f) => QueueItem::Failed(f.with_channel(channel)),
        }
    }

    /// Unwrap down to the raw queued payload, discarding retry history.
    pub fn into_queued(self) -> QueuedPayload {
        match self {
            QueueItem::Queued(q) => q,
            QueueItem::Failed(f) => f.into_inner(),
        }
    }
}

impl From<Payload> for QueueItem {
    fn from(payload: Payload) -> Self {
        QueueItem::Queued(QueuedPayload::new(payload))
    }
}

impl From<QueuedPayload> for QueueItem {
    fn from(queued: QueuedPayload) -> Self {
        QueueItem::Queued(queued)
    }
}

impl From<FailedPayload> for QueueItem {
    fn from(failed: FailedPayload) -> Self {
        QueueItem::Failed(failed)
    }
}
