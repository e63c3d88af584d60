//! Courier broker client
//!
//! The contract against the append-only message broker: publish one payload
//! to a topic, consume a batch from an offset, and report the topic's
//! current end-offset. The production client (Kafka-class) lives outside
//! this repository; [`MemoryBroker`] is the reference implementation used by
//! the standalone daemon and the tests.

mod error;
mod memory;

pub use error::{BrokerError, Result};
pub use memory::MemoryBroker;

use async_trait::async_trait;

/// What the broker reports back for one accepted publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Broker-assigned message id (the offset, rendered as a string)
    pub message_id: String,
    /// The topic the broker wrote to; callers verify it echoes their input
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Broker client operations
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish one raw payload to `full_topic`.
    async fn publish(&self, full_topic: &str, payload: &str) -> Result<PublishReceipt>;

    /// Consume raw payloads starting at `from_offset`, up to the broker's
    /// natural batch size. With `return_immediately` an empty topic yields an
    /// empty batch; otherwise the call may block up to the broker's poll
    /// window before giving up.
    async fn consume(
        &self,
        full_topic: &str,
        from_offset: i64,
        return_immediately: bool,
    ) -> Result<Vec<String>>;

    /// The topic's current end-offset (the offset the next publish gets).
    async fn get_offset(&self, full_topic: &str) -> i64;
}
