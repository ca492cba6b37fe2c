//! Self-refilling driver tests.

use std::collections::HashMap;

use relayq::queue::{QueueDriver, SteadyQueue};
use serde_json::json;

fn cron_queue() -> SteadyQueue {
    let mut defaults = HashMap::new();
    defaults.insert(
        "cron".to_string(),
        vec![json!({"task": "sweep"}), json!({"task": "report"})],
    );
    SteadyQueue::new(defaults)
}

#[tokio::test]
async fn empty_channel_is_seeded_from_defaults_on_pop() {
    let queue = cron_queue();

    let popped = queue.pop(Some("cron")).await.unwrap().expect("refilled");
    assert_eq!(popped.content(), &json!({"task": "report"}));
    assert_eq!(queue.size(Some("cron")).await.unwrap(), 2);
}

#[tokio::test]
async fn reserved_items_do_not_trigger_a_refill() {
    let queue = cron_queue();

    let first = queue.pop(Some("cron")).await.unwrap().expect("refilled");
    let second = queue.pop(Some("cron")).await.unwrap().expect("second default");

    // Both defaults are in flight now; the channel is not empty, so no
    // duplicates may appear.
    assert!(queue.pop(Some("cron")).await.unwrap().is_none());
    assert_eq!(queue.size(Some("cron")).await.unwrap(), 2);

    queue
        .release(first.uid().unwrap(), Some("cron"))
        .await
        .unwrap();
    queue
        .release(second.uid().unwrap(), Some("cron"))
        .await
        .unwrap();

    // Drained for real: the next pop refills the defaults again.
    let again = queue.pop(Some("cron")).await.unwrap();
    assert!(again.is_some());
    assert_eq!(queue.size(Some("cron")).await.unwrap(), 2);
}

#[tokio::test]
async fn channels_without_defaults_stay_empty() {
    let queue = cron_queue();
    assert!(queue.pop(Some("adhoc")).await.unwrap().is_none());
}

#[tokio::test]
async fn explicit_pushes_take_precedence_over_defaults() {
    let queue = cron_queue();
    queue
        .push(
            relayq::payload::Payload::new(json!({"task": "urgent"})).into(),
            Some("cron"),
        )
        .await
        .unwrap();

    let popped = queue.pop(Some("cron")).await.unwrap().expect("pushed item");
    assert_eq!(popped.content(), &json!({"task": "urgent"}));
}
