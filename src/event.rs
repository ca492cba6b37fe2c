//! Worker notifications.
//!
//! The closed set of things a worker announces to the outside world.
//! Observers registered at construction receive every event; the bundled
//! [`TracingObserver`] forwards them to the log stream.

use serde::{Deserialize, Serialize};

use crate::payload::{FailedPayload, QueueItem};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// A reserved payload is about to execute.
    PayloadReceived {
        worker: String,
        content: serde_json::Value,
        item: QueueItem,
    },
    PayloadSucceeded {
        worker: String,
        item: QueueItem,
    },
    /// Execution failed recoverably; the payload went back out for retry.
    PayloadRetry {
        worker: String,
        payload: FailedPayload,
        reason: String,
    },
    /// Terminal: retries exhausted or the input itself was rejected.
    PayloadFailure {
        worker: String,
        item: QueueItem,
        error: String,
    },
}

pub trait WorkerObserver: Send + Sync {
    fn notify(&self, event: &WorkerEvent);
}

/// Default observer: mirrors worker events onto the tracing log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl WorkerObserver for TracingObserver {
    fn notify(&self, event: &WorkerEvent) {
        match event {
            WorkerEvent::PayloadReceived { worker, item, .. } => {
                tracing::debug!(worker = %worker, uid = ?item.uid(), "payload received");
            }
            WorkerEvent::PayloadSucceeded { worker, item } => {
                tracing::info!(worker = %worker, uid = ?item.uid(), "payload succeeded");
            }
            WorkerEvent::PayloadRetry {
                worker,
                payload,
                reason,
            } => {
                tracing::warn!(
                    worker = %worker,
                    uid = ?payload.uid(),
                    retries = payload.retry_count(),
                    %reason,
                    "payload requeued for retry"
                );
            }
            WorkerEvent::PayloadFailure {
                worker,
                item,
                error,
            } => {
                tracing::error!(worker = %worker, uid = ?item.uid(), %error, "payload failed");
            }
        }
    }
}
