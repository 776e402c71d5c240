//! Broker contract.
//!
//! The broker is the durable, delay-capable queue the dispatcher writes to and
//! the worker pulls from. Storage, visibility and cross-process delivery are
//! its business; the worker only needs the five primitives below.

#[cfg(feature = "memory")]
pub mod memory;

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;

use crate::{Delivery, JobEvent, JobId, QueueResult, TaskMessage};

/// Type alias for boxed streams (stable Rust compatible)
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

#[async_trait]
pub trait Broker: Send + Sync {
    /// Store a message on `message.queue`, deliverable from `message.process_at`
    async fn enqueue(&self, message: TaskMessage) -> QueueResult<JobId>;

    /// Pull one deliverable message, trying `queues` in the given order
    async fn dequeue(&self, queues: &[&str]) -> QueueResult<Option<Delivery>>;

    /// Remove a successfully handled message
    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Make the message deliverable again at `retry_at`
    async fn retry(&self, delivery: &Delivery, retry_at: DateTime<Utc>, error: &str) -> QueueResult<()>;

    /// Take the message out of the active queues for good (dead-letter or drop)
    async fn archive(&self, delivery: &Delivery, error: &str) -> QueueResult<()>;

    /// Lifecycle events for observability
    fn event_stream(&self) -> BoxStream<JobEvent>;
}
