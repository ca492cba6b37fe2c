//! Queue driver contract and the bundled driver implementations.

pub mod aggregate;
pub mod memory;
pub mod steady;

pub use aggregate::AggregateQueue;
pub use memory::MemoryQueue;
pub use steady::SteadyQueue;

use async_trait::async_trait;
use rand::Rng;

use crate::error::Result;
use crate::payload::QueueItem;

/// Channel used when the caller does not name one.
pub const DEFAULT_CHANNEL: &str = "general";

/// Operation set every backend adapter implements.
///
/// Reservation discipline: `pop` marks an item in flight without deleting
/// it; only `release` removes it. A crash between the two leaves the item
/// poppable again, which is what makes delivery at-least-once. Backends
/// must hand a given uid to at most one concurrent popper (an atomic
/// claim, not a plain read); neither the dispatcher nor the worker can
/// enforce that for them.
///
/// Drivers surface transient failures as read/write errors and never
/// retry internally — bounded retry lives with the caller.
#[async_trait]
pub trait QueueDriver: Send + Sync {
    /// Persist a payload under a channel, stamping a uid if it does not
    /// carry one. Pushing an already-queued item keeps its uid and
    /// creation time and re-stamps its channel.
    async fn push(&self, item: QueueItem, channel: Option<&str>) -> Result<QueueItem>;

    /// Reserve the next available item, or `None` when nothing is
    /// reservable. Selection order is backend-defined and documented per
    /// driver; it is not a fairness guarantee.
    async fn pop(&self, channel: Option<&str>) -> Result<Option<QueueItem>>;

    /// Remove an item. Safe to repeat; unknown uids are a no-op.
    async fn release(&self, uid: &str, channel: Option<&str>) -> Result<()>;

    /// Point lookup. Does not affect pop eligibility.
    async fn find_by_id(&self, uid: &str, channel: Option<&str>) -> Result<Option<QueueItem>>;

    /// Number of stored items, in flight or not.
    async fn size(&self, channel: Option<&str>) -> Result<u64>;

    /// Known channel names.
    async fn list_queues(&self) -> Result<Vec<String>>;
}

/// Case-fold a channel name; absent maps to the reserved default.
pub fn normalize_channel(channel: Option<&str>) -> String {
    match channel {
        Some(name) => name.to_lowercase(),
        None => DEFAULT_CHANNEL.to_string(),
    }
}

const UID_LEN: usize = 24;

/// Storage uid: 24 alphanumeric characters drawn from the driver's RNG,
/// so a seeded driver assigns reproducible uids.
pub(crate) fn generate_uid<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..UID_LEN)
        .map(|_| rng.sample(rand::distr::Alphanumeric) as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_channel_maps_to_general() {
        assert_eq!(normalize_channel(None), DEFAULT_CHANNEL);
    }

    #[test]
    fn channel_names_are_case_folded() {
        assert_eq!(normalize_channel(Some("Mail")), "mail");
        assert_eq!(normalize_channel(Some("FAILED")), "failed");
    }

    #[test]
    fn uids_are_fixed_length_and_seed_stable() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;

        let mut a = StdRng::seed_from_u64(5);
        let mut b = StdRng::seed_from_u64(5);
        let uid = generate_uid(&mut a);
        assert_eq!(uid.len(), UID_LEN);
        assert_eq!(uid, generate_uid(&mut b));
    }
}
