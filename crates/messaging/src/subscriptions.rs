//! Subscription service
//!
//! Subscription CRUD and ACLs, the pull/ack consumption path, and the
//! push-config transition logic. The ack window bookkeeping itself lives in
//! the store ([`Store::update_sub_offset_ack`]); this layer owns ack-id
//! parsing, the `+1` conversion from "last delivered" to "next to read",
//! and the assembly of received-message envelopes.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use courier_broker::Broker;
use courier_store::{Acl, AclResource, Store, SubRecord, TIMESTAMP_FORMAT};

use crate::error::{MessagingError, Result};
use crate::message::Message;

/// Default ack deadline, seconds.
pub const DEFAULT_ACK_DEADLINE_SECS: i64 = 10;

/// The only retry policy the delivery loop implements.
pub const RETRY_POLICY_LINEAR: &str = "linear";

/// Default linear retry period, milliseconds.
pub const DEFAULT_RETRY_PERIOD_MS: u64 = 3000;

/// One pulled message with the ack id a consumer sends back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedMessage {
    #[serde(rename = "ackId")]
    pub ack_id: String,
    pub message: Message,
}

/// What the push manager must do after a push-config change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushTransition {
    /// Nothing changed that a worker cares about
    None,
    /// Endpoint configured where there was none: add + launch a worker
    Start,
    /// Endpoint cleared: stop the worker
    Stop,
    /// Endpoint or retry settings replaced: relaunch with fresh config
    Restart,
}

/// Operations over subscriptions and their consumption state.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn Store>,
    broker: Arc<dyn Broker>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn Store>, broker: Arc<dyn Broker>) -> Self {
        Self { store, broker }
    }

    /// Create a subscription over `topic`, which must already exist in the
    /// same project. The subscription starts at the topic's current
    /// end-offset, so only messages published after creation are delivered.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_sub(
        &self,
        project_uuid: &str,
        name: &str,
        topic: &str,
        push_endpoint: &str,
        ack_deadline_secs: i64,
        retry_policy: &str,
        retry_period_ms: u64,
    ) -> Result<SubRecord> {
        let topics = self.store.query_topics(project_uuid, topic).await?;
        if topics.is_empty() {
            return Err(MessagingError::NotFound);
        }

        let (retry_policy, retry_period_ms) = normalize_retry(retry_policy, retry_period_ms)?;
        let ack_deadline_secs = if ack_deadline_secs <= 0 {
            DEFAULT_ACK_DEADLINE_SECS
        } else {
            ack_deadline_secs
        };

        let full_topic = format!("{project_uuid}.{topic}");
        let offset = self.broker.get_offset(&full_topic).await;

        let sub = SubRecord {
            project_uuid: project_uuid.to_string(),
            name: name.to_string(),
            topic: topic.to_string(),
            offset,
            next_offset: 0,
            pending_ack: String::new(),
            push_endpoint: push_endpoint.to_string(),
            ack_deadline_secs,
            retry_policy,
            retry_period_ms,
        };
        self.store.insert_sub(sub.clone()).await?;
        Ok(sub)
    }

    pub async fn remove_sub(&self, project_uuid: &str, name: &str) -> Result<()> {
        self.store.remove_sub(project_uuid, name).await?;
        Ok(())
    }

    pub async fn get_sub_by_name(&self, project_uuid: &str, name: &str) -> Result<SubRecord> {
        Ok(self.store.query_one_sub(project_uuid, name).await?)
    }

    pub async fn get_subs_by_project(&self, project_uuid: &str) -> Result<Vec<SubRecord>> {
        Ok(self.store.query_subs(project_uuid, "").await?)
    }

    pub async fn has_sub(&self, project_uuid: &str, name: &str) -> bool {
        self.store.query_one_sub(project_uuid, name).await.is_ok()
    }

    pub async fn get_acl(&self, project_uuid: &str, name: &str) -> Result<Acl> {
        Ok(self
            .store
            .query_acl(project_uuid, AclResource::Subscription, name)
            .await?)
    }

    pub async fn mod_acl(&self, project_uuid: &str, name: &str, users: &[String]) -> Result<()> {
        self.store
            .mod_acl(project_uuid, AclResource::Subscription, name, users)
            .await?;
        Ok(())
    }

    /// Pull up to `max_messages` from the subscription's position.
    ///
    /// `max_messages == 0` means no limit beyond the broker's batch size.
    /// Always records the pull window afterwards, whether or not the
    /// consumer ever acks; the next accepted ack reconciles the committed
    /// offset.
    pub async fn pull(
        &self,
        project_uuid: &str,
        project_name: &str,
        name: &str,
        max_messages: usize,
        return_immediately: bool,
    ) -> Result<Vec<ReceivedMessage>> {
        let sub = self.store.query_one_sub(project_uuid, name).await?;

        let raw = self
            .broker
            .consume(&sub.full_topic(), sub.offset, return_immediately)
            .await?;

        let limit = if max_messages == 0 { raw.len() } else { max_messages };
        let prefix = format!("projects/{project_name}/subscriptions/{name}:");
        let mut received = Vec::with_capacity(raw.len().min(limit));
        for (i, payload) in raw.iter().take(limit).enumerate() {
            let mut message = Message::from_wire(payload)?;
            // the broker offset is the message id; the stored payload does
            // not carry it, deliveries stamp it
            let offset = sub.offset + i as i64;
            message.message_id = offset.to_string();
            received.push(ReceivedMessage {
                ack_id: format!("{prefix}{offset}"),
                message,
            });
        }

        let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        self.store
            .update_sub_pull(project_uuid, name, sub.offset + received.len() as i64, &now)
            .await;

        debug!(project = %project_name, sub = %name, delivered = received.len(),
            from_offset = sub.offset, "pull served");
        Ok(received)
    }

    /// Acknowledge one delivered offset by ack id.
    ///
    /// The id's embedded project and subscription must match the addressed
    /// resource; the trailing integer is the last delivered offset, so the
    /// committed offset becomes that plus one.
    pub async fn ack(
        &self,
        project_uuid: &str,
        project_name: &str,
        name: &str,
        ack_id: &str,
    ) -> Result<()> {
        let offset = parse_ack_id(ack_id, project_name, name)?;
        let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        self.store
            .update_sub_offset_ack(project_uuid, name, offset + 1, &now)
            .await?;
        Ok(())
    }

    /// Replace the push configuration and report which worker transition the
    /// change requires. Absent/non-positive retry fields fall back to the
    /// defaults before comparison, so "same config spelled with defaults"
    /// is a no-op rather than a restart.
    pub async fn mod_sub_push(
        &self,
        project_uuid: &str,
        name: &str,
        endpoint: &str,
        retry_policy: &str,
        retry_period_ms: u64,
    ) -> Result<PushTransition> {
        let old = self.store.query_one_sub(project_uuid, name).await?;
        let (retry_policy, retry_period_ms) = normalize_retry(retry_policy, retry_period_ms)?;

        self.store
            .mod_sub_push(project_uuid, name, endpoint, &retry_policy, retry_period_ms)
            .await?;

        let transition = if endpoint.is_empty() {
            if old.push_endpoint.is_empty() {
                PushTransition::None
            } else {
                PushTransition::Stop
            }
        } else if old.push_endpoint.is_empty() {
            PushTransition::Start
        } else if old.push_endpoint != endpoint
            || old.retry_policy != retry_policy
            || old.retry_period_ms != retry_period_ms
        {
            PushTransition::Restart
        } else {
            PushTransition::None
        };
        Ok(transition)
    }
}

/// Apply retry defaults and reject unknown policies.
fn normalize_retry(retry_policy: &str, retry_period_ms: u64) -> Result<(String, u64)> {
    let policy = if retry_policy.is_empty() {
        RETRY_POLICY_LINEAR
    } else {
        retry_policy
    };
    if policy != RETRY_POLICY_LINEAR {
        return Err(MessagingError::Invalid(format!(
            "unsupported retry policy {policy:?}"
        )));
    }
    let period = if retry_period_ms == 0 {
        DEFAULT_RETRY_PERIOD_MS
    } else {
        retry_period_ms
    };
    Ok((policy.to_string(), period))
}

/// Parse `projects/<p>/subscriptions/<s>:<offset>`, checking every segment
/// against the addressed project and subscription.
fn parse_ack_id(ack_id: &str, project_name: &str, sub_name: &str) -> Result<i64> {
    let invalid = || MessagingError::Invalid(format!("invalid ack id {ack_id:?}"));

    let parts: Vec<&str> = ack_id.split('/').collect();
    let ["projects", project, "subscriptions", tail] = parts.as_slice() else {
        return Err(invalid());
    };
    if *project != project_name {
        return Err(invalid());
    }

    let (sub, offset) = tail.split_once(':').ok_or_else(invalid)?;
    if sub != sub_name {
        return Err(invalid());
    }

    // u64 first: a sign or stray character is a malformed id, not a range error
    let offset: u64 = offset.parse().map_err(|_| invalid())?;
    i64::try_from(offset).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_broker::MemoryBroker;
    use courier_store::{MemoryStore, StoreError};

    struct Fixture {
        store: Arc<MemoryStore>,
        broker: Arc<MemoryBroker>,
        svc: SubscriptionService,
        project_uuid: String,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::seeded());
        let broker = Arc::new(MemoryBroker::new());
        let project_uuid = store
            .query_projects("", "demo")
            .await
            .unwrap()
            .remove(0)
            .uuid;
        let svc = SubscriptionService::new(store.clone(), broker.clone());
        Fixture {
            store,
            broker,
            svc,
            project_uuid,
        }
    }

    async fn publish(fx: &Fixture, topic: &str, data: &str) {
        let msg = Message {
            data: data.into(),
            ..Default::default()
        };
        fx.broker
            .publish(
                &format!("{}.{topic}", fx.project_uuid),
                &msg.to_wire().unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_sub_applies_defaults() {
        let fx = fixture().await;

        let sub = fx
            .svc
            .create_sub(&fx.project_uuid, "orders-sub2", "orders", "", 0, "", 0)
            .await
            .unwrap();
        assert_eq!(sub.ack_deadline_secs, DEFAULT_ACK_DEADLINE_SECS);
        assert_eq!(sub.retry_policy, RETRY_POLICY_LINEAR);
        assert_eq!(sub.retry_period_ms, DEFAULT_RETRY_PERIOD_MS);
        assert_eq!(sub.offset, 0);
        assert_eq!(sub.next_offset, 0);
    }

    #[tokio::test]
    async fn create_sub_starts_at_end_offset() {
        let fx = fixture().await;
        publish(&fx, "orders", "bTE=").await;
        publish(&fx, "orders", "bTI=").await;

        let sub = fx
            .svc
            .create_sub(&fx.project_uuid, "late-sub", "orders", "", 10, "linear", 3000)
            .await
            .unwrap();
        assert_eq!(sub.offset, 2);

        // nothing to deliver until something new is published
        let received = fx
            .svc
            .pull(&fx.project_uuid, "demo", "late-sub", 10, true)
            .await
            .unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn create_sub_requires_topic_and_unique_name() {
        let fx = fixture().await;

        assert_eq!(
            fx.svc
                .create_sub(&fx.project_uuid, "s", "ghost-topic", "", 10, "", 0)
                .await,
            Err(MessagingError::NotFound)
        );
        assert_eq!(
            fx.svc
                .create_sub(&fx.project_uuid, "orders-sub", "orders", "", 10, "", 0)
                .await,
            Err(MessagingError::Exists)
        );
    }

    #[tokio::test]
    async fn create_sub_rejects_unknown_policy() {
        let fx = fixture().await;
        let err = fx
            .svc
            .create_sub(&fx.project_uuid, "s", "orders", "", 10, "exponential", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::Invalid(_)));
    }

    #[tokio::test]
    async fn pull_then_ack_round_trip() {
        let fx = fixture().await;
        publish(&fx, "orders", "bTE=").await;
        publish(&fx, "orders", "bTI=").await;

        let received = fx
            .svc
            .pull(&fx.project_uuid, "demo", "orders-sub", 10, true)
            .await
            .unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].ack_id, "projects/demo/subscriptions/orders-sub:0");
        assert_eq!(received[1].ack_id, "projects/demo/subscriptions/orders-sub:1");
        assert_eq!(received[0].message.data, "bTE=");

        let sub = fx
            .store
            .query_one_sub(&fx.project_uuid, "orders-sub")
            .await
            .unwrap();
        assert_eq!(sub.next_offset, 2);

        fx.svc
            .ack(
                &fx.project_uuid,
                "demo",
                "orders-sub",
                "projects/demo/subscriptions/orders-sub:1",
            )
            .await
            .unwrap();

        let sub = fx
            .store
            .query_one_sub(&fx.project_uuid, "orders-sub")
            .await
            .unwrap();
        assert_eq!(sub.offset, 2);
        assert_eq!(sub.next_offset, 0);

        // window is closed now
        let err = fx
            .svc
            .ack(
                &fx.project_uuid,
                "demo",
                "orders-sub",
                "projects/demo/subscriptions/orders-sub:1",
            )
            .await
            .unwrap_err();
        assert_eq!(err, MessagingError::NoAckPending);
    }

    #[tokio::test]
    async fn pull_honors_max_messages() {
        let fx = fixture().await;
        for data in ["bTE=", "bTI=", "bTM="] {
            publish(&fx, "orders", data).await;
        }

        let received = fx
            .svc
            .pull(&fx.project_uuid, "demo", "orders-sub", 2, true)
            .await
            .unwrap();
        assert_eq!(received.len(), 2);

        // the window covers only what was delivered
        let sub = fx
            .store
            .query_one_sub(&fx.project_uuid, "orders-sub")
            .await
            .unwrap();
        assert_eq!(sub.next_offset, 2);
    }

    #[tokio::test]
    async fn ack_out_of_range_is_wrong_ack() {
        let fx = fixture().await;
        publish(&fx, "orders", "bTE=").await;
        publish(&fx, "orders", "bTI=").await;

        fx.svc
            .pull(&fx.project_uuid, "demo", "orders-sub", 10, true)
            .await
            .unwrap();

        let err = fx
            .svc
            .ack(
                &fx.project_uuid,
                "demo",
                "orders-sub",
                "projects/demo/subscriptions/orders-sub:5",
            )
            .await
            .unwrap_err();
        assert_eq!(err, MessagingError::WrongAck);
    }

    #[tokio::test]
    async fn ack_id_parsing_rejects_deviations() {
        for bad in [
            "projects/demo/subscriptions/orders-sub",
            "projects/demo/subscriptions/orders-sub:",
            "projects/demo/subscriptions/orders-sub:abc",
            "projects/demo/subscriptions/orders-sub:-1",
            "projects/demo/subscriptions/other-sub:1",
            "projects/other/subscriptions/orders-sub:1",
            "projects/demo/topics/orders-sub:1",
            "subscriptions/orders-sub:1",
            "",
        ] {
            let err = parse_ack_id(bad, "demo", "orders-sub").unwrap_err();
            assert!(matches!(err, MessagingError::Invalid(_)), "accepted {bad:?}");
        }

        assert_eq!(
            parse_ack_id("projects/demo/subscriptions/orders-sub:41", "demo", "orders-sub")
                .unwrap(),
            41
        );
    }

    #[tokio::test]
    async fn mod_sub_push_transition_table() {
        let fx = fixture().await;
        let uuid = &fx.project_uuid;

        // empty -> empty
        assert_eq!(
            fx.svc
                .mod_sub_push(uuid, "orders-sub", "", "", 0)
                .await
                .unwrap(),
            PushTransition::None
        );

        // empty -> E
        assert_eq!(
            fx.svc
                .mod_sub_push(uuid, "orders-sub", "http://x/x", "", 0)
                .await
                .unwrap(),
            PushTransition::Start
        );

        // E -> E with defaults spelled out: unchanged
        assert_eq!(
            fx.svc
                .mod_sub_push(uuid, "orders-sub", "http://x/x", "linear", 3000)
                .await
                .unwrap(),
            PushTransition::None
        );

        // E -> E with a different period
        assert_eq!(
            fx.svc
                .mod_sub_push(uuid, "orders-sub", "http://x/x", "linear", 500)
                .await
                .unwrap(),
            PushTransition::Restart
        );

        // E -> E'
        assert_eq!(
            fx.svc
                .mod_sub_push(uuid, "orders-sub", "http://y/y", "linear", 500)
                .await
                .unwrap(),
            PushTransition::Restart
        );

        // E -> empty
        assert_eq!(
            fx.svc
                .mod_sub_push(uuid, "orders-sub", "", "", 0)
                .await
                .unwrap(),
            PushTransition::Stop
        );

        assert_eq!(
            fx.svc.mod_sub_push(uuid, "ghost", "http://x/x", "", 0).await,
            Err(MessagingError::NotFound)
        );
    }

    #[tokio::test]
    async fn removed_sub_operations_fail() {
        let fx = fixture().await;

        fx.svc.remove_sub(&fx.project_uuid, "orders-sub").await.unwrap();
        assert_eq!(
            fx.svc.pull(&fx.project_uuid, "demo", "orders-sub", 1, true).await,
            Err(MessagingError::NotFound)
        );
        assert_eq!(
            fx.store.query_one_sub(&fx.project_uuid, "orders-sub").await,
            Err(StoreError::NotFound)
        );
    }
}
