//! Application state
//!
//! Shared handles for the HTTP handlers: the store, the broker, the push
//! manager, and the per-resource enforcement flag. This is the explicit
//! per-request context: handlers receive it through Axum state, identities
//! through request extensions, and nothing lives in process-wide mutable
//! globals beyond the push manager's own registry.

use std::sync::Arc;

use courier_broker::Broker;
use courier_messaging::{SubscriptionService, TopicService};
use courier_push::Manager;
use courier_store::Store;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub broker: Arc<dyn Broker>,
    pub manager: Arc<Manager>,
    /// Enforce per-resource ACLs on publish and pull
    pub per_resource_auth: bool,
}

impl AppState {
    /// Create state with per-resource ACL enforcement on.
    pub fn new(store: Arc<dyn Store>, broker: Arc<dyn Broker>, manager: Arc<Manager>) -> Self {
        Self {
            store,
            broker,
            manager,
            per_resource_auth: true,
        }
    }

    /// Toggle per-resource ACL enforcement.
    pub fn with_per_resource_auth(mut self, enabled: bool) -> Self {
        self.per_resource_auth = enabled;
        self
    }

    /// Topic service over this state's store and broker.
    pub fn topics(&self) -> TopicService {
        TopicService::new(Arc::clone(&self.store), Arc::clone(&self.broker))
    }

    /// Subscription service over this state's store and broker.
    pub fn subs(&self) -> SubscriptionService {
        SubscriptionService::new(Arc::clone(&self.store), Arc::clone(&self.broker))
    }
}
