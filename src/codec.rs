//! Codec boundary between in-memory payloads and backend storage bytes.
//!
//! Drivers never persist payload values directly; they run an [`Envelope`]
//! through the injected [`Codec`] pair, so a backend's storage encoding can
//! change without touching the payload model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::payload::{FailedPayload, Payload, QueueItem, QueuedPayload};

/// Wire form of a payload: the opaque content plus retry bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub content: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

impl Envelope {
    pub fn from_item(item: &QueueItem) -> Self {
        Self {
            content: item.content().clone(),
            retry_count: match item {
                QueueItem::Failed(failed) => Some(failed.retry_count()),
                QueueItem::Queued(_) => None,
            },
        }
    }

    /// Rebuild the payload a record holds, restoring the failure wrapper
    /// when a retry counter was stored alongside the content.
    pub fn into_item(
        self,
        uid: impl Into<String>,
        channel: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> QueueItem {
        let queued = QueuedPayload::restored(Payload::new(self.content), uid, channel, created_at);
        match self.retry_count {
            Some(count) => FailedPayload::new(queued).with_retry_count(count).into(),
            None => queued.into(),
        }
    }
}

/// Forward/backward transform pair between envelopes and stored bytes.
pub trait Codec: Send + Sync {
    fn forward(&self, envelope: &Envelope) -> Result<Vec<u8>>;
    fn backward(&self, bytes: &[u8]) -> Result<Envelope>;
}

/// JSON encoding, the default for every bundled driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn forward(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(envelope)?)
    }

    fn backward(&self, bytes: &[u8]) -> Result<Envelope> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
