//! Push delivery worker
//!
//! The per-subscription delivery loop. Configuration (endpoint, retry
//! period) is loaded once at launch and the manager restarts the worker
//! when it changes, while the consume offset is re-read from the store
//! every round so pull-side acks and worker deliveries stay reconciled.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_broker::Broker;
use courier_messaging::Message;
use courier_store::Store;

/// The JSON body POSTed to a push endpoint, one per message.
#[derive(Debug, Clone, Serialize)]
pub struct PushEnvelope {
    pub subscription: String,
    pub message: Message,
    #[serde(rename = "deliveryAttempt")]
    pub delivery_attempt: u64,
}

/// One delivery loop bound to a single subscription.
#[derive(Clone)]
pub(crate) struct Worker {
    pub store: Arc<dyn Store>,
    pub broker: Arc<dyn Broker>,
    pub client: reqwest::Client,
    pub project_uuid: String,
    pub project_name: String,
    pub sub_name: String,
    pub cancel: CancellationToken,
}

impl Worker {
    /// Run until cancelled or the subscription disappears.
    pub async fn run(self) {
        let Some((endpoint, retry_period)) = self.load_config().await else {
            return;
        };

        info!(project = %self.project_name, sub = %self.sub_name, endpoint = %endpoint,
            "push worker started");

        let subscription = format!(
            "projects/{}/subscriptions/{}",
            self.project_name, self.sub_name
        );

        while !self.cancel.is_cancelled() {
            let sub = tokio::select! {
                _ = self.cancel.cancelled() => break,
                sub = self.store.query_one_sub(&self.project_uuid, &self.sub_name) => sub,
            };
            let Ok(sub) = sub else {
                warn!(project = %self.project_name, sub = %self.sub_name,
                    "subscription gone, push worker exiting");
                break;
            };

            let full_topic = sub.full_topic();
            let batch = tokio::select! {
                _ = self.cancel.cancelled() => break,
                batch = self.broker.consume(&full_topic, sub.offset, true) => batch,
            };
            let batch = match batch {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(sub = %self.sub_name, error = %e, "push consume failed");
                    if self.pause(retry_period).await {
                        break;
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                // drained; idle one retry period before polling again
                if self.pause(retry_period).await {
                    break;
                }
                continue;
            }

            for (i, raw) in batch.iter().enumerate() {
                let offset = sub.offset + i as i64;
                let mut message = match Message::from_wire(raw) {
                    Ok(message) => message,
                    Err(e) => {
                        // skip the poison entry rather than retry it forever
                        warn!(sub = %self.sub_name, offset, error = %e,
                            "undecodable message skipped");
                        self.store
                            .update_sub_offset(&self.project_uuid, &self.sub_name, offset + 1)
                            .await;
                        continue;
                    }
                };
                message.message_id = offset.to_string();

                if !self
                    .deliver(&endpoint, &subscription, message, offset, retry_period)
                    .await
                {
                    return;
                }
            }
        }

        info!(project = %self.project_name, sub = %self.sub_name, "push worker stopped");
    }

    async fn load_config(&self) -> Option<(String, Duration)> {
        let sub = match self.store.query_one_sub(&self.project_uuid, &self.sub_name).await {
            Ok(sub) => sub,
            Err(e) => {
                warn!(sub = %self.sub_name, error = %e, "push worker cannot load subscription");
                return None;
            }
        };
        if !sub.has_push() {
            debug!(sub = %self.sub_name, "no push endpoint configured, worker exiting");
            return None;
        }
        Some((
            sub.push_endpoint.clone(),
            Duration::from_millis(sub.retry_period_ms),
        ))
    }

    /// POST one message until it lands or the worker is cancelled. Returns
    /// false when cancellation won.
    async fn deliver(
        &self,
        endpoint: &str,
        subscription: &str,
        message: Message,
        offset: i64,
        retry_period: Duration,
    ) -> bool {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            let envelope = PushEnvelope {
                subscription: subscription.to_string(),
                message: message.clone(),
                delivery_attempt: attempt,
            };

            let response = tokio::select! {
                _ = self.cancel.cancelled() => return false,
                response = self.client.post(endpoint).json(&envelope).send() => response,
            };

            match response {
                Ok(response) if response.status().is_success() => {
                    // implicit ack: the endpoint took it, advance past it
                    self.store
                        .update_sub_offset(&self.project_uuid, &self.sub_name, offset + 1)
                        .await;
                    debug!(sub = %self.sub_name, offset, attempt, "pushed");
                    return true;
                }
                Ok(response) => {
                    warn!(sub = %self.sub_name, offset, attempt,
                        status = %response.status(), "push endpoint rejected message");
                }
                Err(e) => {
                    warn!(sub = %self.sub_name, offset, attempt, error = %e,
                        "push request failed");
                }
            }

            // linear policy: fixed pause, then the same message again
            if self.pause(retry_period).await {
                return false;
            }
        }
    }

    /// Sleep one period, waking early on cancellation. Returns true when
    /// cancelled.
    async fn pause(&self, period: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(period) => false,
        }
    }
}
