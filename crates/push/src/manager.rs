//! Push manager
//!
//! Registry of delivery workers, one per push-enabled subscription, keyed by
//! `(project_uuid, subscription)`. Lifecycle operations are atomic per key
//! and idempotent; a launched worker runs under a supervisor that relaunches
//! it after a panic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use courier_broker::Broker;
use courier_store::Store;

use crate::worker::Worker;
use crate::{DEFAULT_REQUEST_TIMEOUT, SUPERVISOR_BACKOFF};

struct Handle {
    project_name: String,
    cancel: CancellationToken,
    running: bool,
}

/// Owns and drives the push delivery workers.
pub struct Manager {
    store: Arc<dyn Store>,
    broker: Arc<dyn Broker>,
    client: reqwest::Client,
    workers: Mutex<HashMap<(String, String), Handle>>,
}

impl Manager {
    pub fn new(store: Arc<dyn Store>, broker: Arc<dyn Broker>) -> Self {
        Self::with_request_timeout(store, broker, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Build a manager whose push POSTs use the given timeout.
    pub fn with_request_timeout(
        store: Arc<dyn Store>,
        broker: Arc<dyn Broker>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            store,
            broker,
            client,
            workers: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), Handle>> {
        self.workers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a worker handle for the subscription. Idempotent; the
    /// worker does not run until [`launch`](Self::launch).
    pub fn add(&self, project_uuid: &str, project_name: &str, sub: &str) {
        let mut workers = self.lock();
        workers
            .entry((project_uuid.to_string(), sub.to_string()))
            .or_insert_with(|| Handle {
                project_name: project_name.to_string(),
                cancel: CancellationToken::new(),
                running: false,
            });
    }

    /// Start the delivery loop for a previously added subscription.
    /// Idempotent when already running; a no-op for unknown keys.
    pub fn launch(&self, project_uuid: &str, sub: &str) {
        let mut workers = self.lock();
        let Some(handle) = workers.get_mut(&(project_uuid.to_string(), sub.to_string())) else {
            return;
        };
        if handle.running {
            return;
        }
        handle.running = true;

        let worker = Worker {
            store: Arc::clone(&self.store),
            broker: Arc::clone(&self.broker),
            client: self.client.clone(),
            project_uuid: project_uuid.to_string(),
            project_name: handle.project_name.clone(),
            sub_name: sub.to_string(),
            cancel: handle.cancel.clone(),
        };
        tokio::spawn(supervise(worker));
    }

    /// Cancel the worker and drop its handle. Idempotent for subscriptions
    /// that never had one.
    pub fn stop(&self, project_uuid: &str, sub: &str) {
        let mut workers = self.lock();
        if let Some(handle) = workers.remove(&(project_uuid.to_string(), sub.to_string())) {
            handle.cancel.cancel();
            info!(project = %handle.project_name, sub, "push worker stop requested");
        }
    }

    /// Stop, then add and launch with configuration re-read from the store.
    pub fn restart(&self, project_uuid: &str, project_name: &str, sub: &str) {
        self.stop(project_uuid, sub);
        self.add(project_uuid, project_name, sub);
        self.launch(project_uuid, sub);
    }

    /// Whether a live (launched, not cancelled) worker exists for the key.
    pub fn is_running(&self, project_uuid: &str, sub: &str) -> bool {
        let workers = self.lock();
        workers
            .get(&(project_uuid.to_string(), sub.to_string()))
            .map(|h| h.running && !h.cancel.is_cancelled())
            .unwrap_or(false)
    }

    /// Add and launch a worker for every push-enabled subscription in the
    /// store. Called once at boot.
    pub async fn rehydrate(&self) {
        let subs = self.store.query_push_subs().await;
        for sub in subs {
            let project_name = match self.store.query_projects(&sub.project_uuid, "").await {
                Ok(mut projects) if !projects.is_empty() => projects.remove(0).name,
                _ => {
                    warn!(sub = %sub.name, project_uuid = %sub.project_uuid,
                        "push subscription references unknown project, skipped");
                    continue;
                }
            };
            self.add(&sub.project_uuid, &project_name, &sub.name);
            self.launch(&sub.project_uuid, &sub.name);
        }
    }
}

/// Run the worker, relaunching after panics until cancellation.
async fn supervise(worker: Worker) {
    loop {
        let cancel = worker.cancel.clone();
        let result = tokio::spawn(worker.clone().run()).await;
        match result {
            Ok(()) => break,
            Err(e) if e.is_panic() => {
                warn!(sub = %worker.sub_name, "push worker panicked, relaunching");
                if cancel.is_cancelled() {
                    break;
                }
                tokio::time::sleep(SUPERVISOR_BACKOFF).await;
                if cancel.is_cancelled() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
