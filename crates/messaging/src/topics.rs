//! Topic service
//!
//! Topic CRUD, ACLs, and the publish dispatch path.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use courier_broker::Broker;
use courier_store::{Acl, AclResource, Store, TopicRecord};

use crate::error::{MessagingError, Result};
use crate::message::Message;

/// Operations over topics and their ACLs.
#[derive(Clone)]
pub struct TopicService {
    store: Arc<dyn Store>,
    broker: Arc<dyn Broker>,
}

impl TopicService {
    pub fn new(store: Arc<dyn Store>, broker: Arc<dyn Broker>) -> Self {
        Self { store, broker }
    }

    /// Create a topic. Fails with `Exists` on a duplicate name.
    pub async fn create_topic(&self, project_uuid: &str, name: &str) -> Result<TopicRecord> {
        self.store.insert_topic(project_uuid, name).await?;
        Ok(TopicRecord {
            project_uuid: project_uuid.to_string(),
            name: name.to_string(),
        })
    }

    /// Remove a topic. Subscriptions over it are deliberately left in place:
    /// they turn into orphans whose pulls drain whatever the broker still
    /// holds for the old topic key.
    pub async fn remove_topic(&self, project_uuid: &str, name: &str) -> Result<()> {
        self.store.remove_topic(project_uuid, name).await?;
        Ok(())
    }

    pub async fn get_topic_by_name(&self, project_uuid: &str, name: &str) -> Result<TopicRecord> {
        let mut topics = self.store.query_topics(project_uuid, name).await?;
        if topics.is_empty() {
            return Err(MessagingError::NotFound);
        }
        Ok(topics.remove(0))
    }

    pub async fn get_topics_by_project(&self, project_uuid: &str) -> Result<Vec<TopicRecord>> {
        Ok(self.store.query_topics(project_uuid, "").await?)
    }

    pub async fn has_topic(&self, project_uuid: &str, name: &str) -> bool {
        self.store
            .query_topics(project_uuid, name)
            .await
            .map(|topics| !topics.is_empty())
            .unwrap_or(false)
    }

    pub async fn get_acl(&self, project_uuid: &str, name: &str) -> Result<Acl> {
        Ok(self
            .store
            .query_acl(project_uuid, AclResource::Topic, name)
            .await?)
    }

    pub async fn mod_acl(&self, project_uuid: &str, name: &str, users: &[String]) -> Result<()> {
        self.store
            .mod_acl(project_uuid, AclResource::Topic, name, users)
            .await?;
        Ok(())
    }

    /// Publish a batch to `<project_uuid>.<topic>` in submission order.
    ///
    /// The first failing publish aborts the remainder and surfaces its
    /// error; messages already accepted keep their ids (there is no
    /// rollback), so the caller sees a prefix of the batch on the broker.
    pub async fn publish_batch(
        &self,
        project_uuid: &str,
        topic: &str,
        mut messages: Vec<Message>,
    ) -> Result<Vec<String>> {
        let full_topic = format!("{project_uuid}.{topic}");
        let now = Utc::now();
        let mut ids = Vec::with_capacity(messages.len());

        for msg in &mut messages {
            msg.stamp_publish_time(now);
            let payload = msg.to_wire()?;

            let receipt = match self.broker.publish(&full_topic, &payload).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    warn!(topic = %full_topic, accepted = ids.len(), error = %e,
                        "publish batch aborted");
                    return Err(e.into());
                }
            };

            if receipt.topic != full_topic {
                return Err(MessagingError::Inconsistent(format!(
                    "broker reports topic {:?} for publish to {full_topic:?}",
                    receipt.topic
                )));
            }

            msg.message_id = receipt.message_id.clone();
            ids.push(receipt.message_id);
        }

        Ok(ids)
    }
}
