//! # relayq
//!
//! Storage-agnostic durable work queues: producers push opaque payloads
//! into named channels, workers reserve and execute them with
//! at-least-once delivery, bounded retry, and failure escalation.
//!
//! Backends implement the [`queue::QueueDriver`] contract (a reference
//! in-memory driver ships with the crate); [`queue::AggregateQueue`]
//! composes named drivers behind weighted alias-method channel selection;
//! [`worker::Worker`] owns the reserve → stage → execute → resolve cycle.

pub mod alias;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod payload;
pub mod queue;
pub mod worker;
