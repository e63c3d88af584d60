//! In-memory broker
//!
//! One append-only `Vec` per topic under a mutex. Offsets are indices into
//! the log; the message id of a publish is its offset rendered as a string,
//! which is what the pull path embeds in ack ids.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{BrokerError, Result};
use crate::{Broker, PublishReceipt};

/// Default cap on a single message payload, 1 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// Largest batch one consume call returns.
const CONSUME_BATCH: usize = 100;

/// How long a non-immediate consume waits for data before returning empty.
const POLL_WINDOW: Duration = Duration::from_millis(300);

/// In-memory [`Broker`] implementation.
pub struct MemoryBroker {
    topics: Mutex<HashMap<String, Vec<String>>>,
    max_payload: usize,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Build a broker with a custom payload cap. Tests use small caps to
    /// exercise the oversize path without megabyte fixtures.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            max_payload,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.topics.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_batch(&self, full_topic: &str, from_offset: i64) -> Vec<String> {
        let topics = self.lock();
        let Some(log) = topics.get(full_topic) else {
            return Vec::new();
        };
        let start = from_offset.max(0) as usize;
        log.iter().skip(start).take(CONSUME_BATCH).cloned().collect()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, full_topic: &str, payload: &str) -> Result<PublishReceipt> {
        if payload.len() > self.max_payload {
            return Err(BrokerError::PayloadTooLarge);
        }
        let mut topics = self.lock();
        let log = topics.entry(full_topic.to_string()).or_default();
        let offset = log.len() as i64;
        log.push(payload.to_string());
        Ok(PublishReceipt {
            message_id: offset.to_string(),
            topic: full_topic.to_string(),
            partition: 0,
            offset,
        })
    }

    async fn consume(
        &self,
        full_topic: &str,
        from_offset: i64,
        return_immediately: bool,
    ) -> Result<Vec<String>> {
        let batch = self.read_batch(full_topic, from_offset);
        if !batch.is_empty() || return_immediately {
            return Ok(batch);
        }
        // Bounded poll window, then give up with whatever is there.
        tokio::time::sleep(POLL_WINDOW).await;
        Ok(self.read_batch(full_topic, from_offset))
    }

    async fn get_offset(&self, full_topic: &str) -> i64 {
        self.lock()
            .get(full_topic)
            .map(|log| log.len() as i64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_assigns_sequential_offsets() {
        let broker = MemoryBroker::new();

        let first = broker.publish("p1.orders", "m1").await.unwrap();
        let second = broker.publish("p1.orders", "m2").await.unwrap();

        assert_eq!(first.offset, 0);
        assert_eq!(first.message_id, "0");
        assert_eq!(first.topic, "p1.orders");
        assert_eq!(second.offset, 1);
        assert_eq!(broker.get_offset("p1.orders").await, 2);
    }

    #[tokio::test]
    async fn consume_preserves_publish_order() {
        let broker = MemoryBroker::new();
        for payload in ["a", "b", "c"] {
            broker.publish("p1.orders", payload).await.unwrap();
        }

        let batch = broker.consume("p1.orders", 0, true).await.unwrap();
        assert_eq!(batch, vec!["a", "b", "c"]);

        let tail = broker.consume("p1.orders", 2, true).await.unwrap();
        assert_eq!(tail, vec!["c"]);
    }

    #[tokio::test]
    async fn consume_empty_returns_immediately() {
        let broker = MemoryBroker::new();
        let batch = broker.consume("p1.missing", 0, true).await.unwrap();
        assert!(batch.is_empty());

        // past the end of a known topic behaves the same
        broker.publish("p1.orders", "a").await.unwrap();
        let batch = broker.consume("p1.orders", 5, true).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn oversize_payload_is_rejected() {
        let broker = MemoryBroker::with_max_payload(8);

        assert_eq!(
            broker.publish("p1.orders", "123456789").await,
            Err(BrokerError::PayloadTooLarge)
        );
        // nothing was appended
        assert_eq!(broker.get_offset("p1.orders").await, 0);
    }

    #[tokio::test]
    async fn offsets_are_independent_per_topic() {
        let broker = MemoryBroker::new();
        broker.publish("p1.orders", "a").await.unwrap();
        let other = broker.publish("p1.invoices", "b").await.unwrap();
        assert_eq!(other.offset, 0);
    }
}
