//! Dispatcher tests: registration, weighted selection, scatter operations.

use std::sync::Arc;

use relayq::error::Error;
use relayq::payload::{Payload, QueueItem};
use relayq::queue::{AggregateQueue, MemoryQueue, QueueDriver};
use serde_json::json;

fn item(content: serde_json::Value) -> QueueItem {
    Payload::new(content).into()
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[test]
fn duplicate_registration_is_a_config_error() {
    let mut queue = AggregateQueue::new();
    queue
        .add_queue("jobs", Arc::new(MemoryQueue::new()), 1.0)
        .unwrap();

    let again = queue.add_queue("jobs", Arc::new(MemoryQueue::new()), 2.0);
    assert!(matches!(again, Err(Error::Config(_))));

    // Registration is case-folded like every other channel name.
    let folded = queue.add_queue("Jobs", Arc::new(MemoryQueue::new()), 1.0);
    assert!(matches!(folded, Err(Error::Config(_))));
}

#[test]
fn nonpositive_weights_are_rejected_at_registration() {
    let mut queue = AggregateQueue::new();
    let zero = queue.add_queue("a", Arc::new(MemoryQueue::new()), 0.0);
    assert!(matches!(zero, Err(Error::Config(_))));

    let negative = queue.add_queue("b", Arc::new(MemoryQueue::new()), -1.0);
    assert!(matches!(negative, Err(Error::Config(_))));
}

#[tokio::test]
async fn unregistered_channel_access_is_a_read_error() {
    let queue = AggregateQueue::new();

    let popped = queue.pop(Some("nowhere")).await;
    assert!(matches!(popped, Err(Error::Read(_))));

    let pushed = queue.push(item(json!(1)), Some("nowhere")).await;
    assert!(matches!(pushed, Err(Error::Read(_))));
}

// ---------------------------------------------------------------------------
// Scoped delegation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scoped_push_and_pop_bypass_weighting() {
    let mut queue = AggregateQueue::new();
    queue
        .add_queue("mail", Arc::new(MemoryQueue::new()), 0.001)
        .unwrap();

    let pushed = queue.push(item(json!("letter")), Some("mail")).await.unwrap();
    assert_eq!(pushed.channel(), Some("mail"));

    let popped = queue.pop(Some("Mail")).await.unwrap().expect("delegated");
    assert_eq!(popped.uid(), pushed.uid());
}

// ---------------------------------------------------------------------------
// Weighted selection
// ---------------------------------------------------------------------------

fn skewed_queue(seed: u64) -> AggregateQueue {
    let mut queue = AggregateQueue::with_seed(seed);
    queue
        .add_queue("a", Arc::new(MemoryQueue::new()), 0.1)
        .unwrap();
    queue
        .add_queue("b", Arc::new(MemoryQueue::new()), 0.9)
        .unwrap();
    queue
}

#[tokio::test]
async fn unscoped_pop_follows_the_weight_distribution() {
    let queue = skewed_queue(42);
    let draws = 10_000;
    for n in 0..draws {
        queue.push(item(json!(n)), Some("a")).await.unwrap();
        queue.push(item(json!(n)), Some("b")).await.unwrap();
    }

    let mut from_b = 0usize;
    for _ in 0..draws {
        let popped = queue.pop(None).await.unwrap().expect("both channels seeded");
        if popped.channel() == Some("b") {
            from_b += 1;
        }
    }

    let share = from_b as f64 / draws as f64;
    assert!((share - 0.9).abs() < 0.05, "heavy channel drew {share}");
}

#[tokio::test]
async fn unscoped_push_follows_the_weight_distribution() {
    let queue = skewed_queue(7);
    let draws = 10_000u64;
    for n in 0..draws {
        queue.push(item(json!(n)), None).await.unwrap();
    }

    let heavy = queue.size(Some("b")).await.unwrap();
    assert_eq!(queue.size(None).await.unwrap(), draws);
    let share = heavy as f64 / draws as f64;
    assert!((share - 0.9).abs() < 0.05, "heavy channel took {share}");
}

#[tokio::test]
async fn unscoped_pop_falls_through_drained_channels() {
    let queue = skewed_queue(3);
    // Only the light channel holds anything; the heavy channel must be
    // discarded from the candidate set and the draw must still land.
    queue.push(item(json!("lone")), Some("a")).await.unwrap();

    let popped = queue.pop(None).await.unwrap().expect("found via redraw");
    assert_eq!(popped.channel(), Some("a"));

    // Candidates exhaust cleanly once nothing is reservable anywhere.
    assert!(queue.pop(None).await.unwrap().is_none());
}

#[tokio::test]
async fn unscoped_pop_with_no_registered_channels_is_empty() {
    let queue = AggregateQueue::new();
    assert!(queue.pop(None).await.unwrap().is_none());
}

#[tokio::test]
async fn unscoped_push_with_no_registered_channels_is_a_write_error() {
    let queue = AggregateQueue::new();
    let pushed = queue.push(item(json!(1)), None).await;
    assert!(matches!(pushed, Err(Error::Write(_))));
}

// ---------------------------------------------------------------------------
// Scatter operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unscoped_find_and_release_scan_registered_channels() {
    let queue = skewed_queue(11);
    let pushed = queue.push(item(json!("roam")), Some("b")).await.unwrap();
    let uid = pushed.uid().unwrap();

    let found = queue.find_by_id(uid, None).await.unwrap().expect("scattered find");
    assert_eq!(found.channel(), Some("b"));

    queue.release(uid, None).await.unwrap();
    assert_eq!(queue.size(None).await.unwrap(), 0);

    // Releasing an unknown uid scatters to nothing, silently.
    queue.release(uid, None).await.unwrap();
}

#[tokio::test]
async fn size_without_a_channel_sums_all_channels() {
    let queue = skewed_queue(5);
    queue.push(item(json!(1)), Some("a")).await.unwrap();
    queue.push(item(json!(2)), Some("b")).await.unwrap();
    queue.push(item(json!(3)), Some("b")).await.unwrap();

    assert_eq!(queue.size(None).await.unwrap(), 3);
    assert_eq!(queue.size(Some("b")).await.unwrap(), 2);
}

#[tokio::test]
async fn list_queues_returns_registered_names() {
    let queue = skewed_queue(1);
    assert_eq!(queue.list_queues().await.unwrap(), vec!["a", "b"]);
}
