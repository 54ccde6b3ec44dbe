//! Event bus over the relayer push API.
//!
//! Wraps every handler so that a failure inside it is logged and contained:
//! the relayer's callback machinery must never see a panic from a handler.

use crate::client::{MessageHandler, RelayerClient, SubscriptionId, Topic};
use parking_lot::Mutex;
use relay_telemetry::{DropReason, Metrics};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Subscription front-end for a single relayer connection.
pub struct EventBus {
    client: Arc<dyn RelayerClient>,
    /// Ids registered through this bus and not yet released.
    live: Mutex<HashSet<SubscriptionId>>,
}

impl EventBus {
    pub fn new(client: Arc<dyn RelayerClient>) -> Self {
        Self {
            client,
            live: Mutex::new(HashSet::new()),
        }
    }

    /// Register `handler` for every message on `topic`.
    ///
    /// Returns `None` when the relayer rejects the registration or resolves
    /// without an id. That is not fatal: the topic simply has no live
    /// updates.
    pub async fn subscribe(&self, topic: &Topic, handler: MessageHandler) -> Option<SubscriptionId> {
        let guarded = guard_handler(topic, handler);

        match self.client.register_callback(topic, guarded).await {
            Ok(Some(id)) => {
                self.live.lock().insert(id.clone());
                Metrics::subscription_opened();
                debug!(topic = %topic, id = %id, "Subscribed");
                Some(id)
            }
            Ok(None) => {
                Metrics::registration_failed(topic.kind());
                warn!(topic = %topic, "Registration resolved without a callback id");
                None
            }
            Err(e) => {
                Metrics::registration_failed(topic.kind());
                warn!(topic = %topic, error = %e, "Registration failed");
                None
            }
        }
    }

    /// Register a handler that receives JSON-decoded payloads.
    ///
    /// Messages that fail to decode as `T` are logged and dropped.
    pub async fn subscribe_json<T, F>(&self, topic: &Topic, handler: F) -> Option<SubscriptionId>
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let label = topic.to_string();
        let kind = topic.kind();
        let decode: MessageHandler = Arc::new(move |message: &str| {
            match serde_json::from_str::<T>(message) {
                Ok(payload) => handler(payload),
                Err(e) => {
                    Metrics::event_dropped(kind, DropReason::Malformed);
                    warn!(topic = %label, error = %e, "Dropping undecodable message");
                }
            }
        });
        self.subscribe(topic, decode).await
    }

    /// Release a subscription. Releasing an unknown or already released id is
    /// a no-op; returns whether anything was released.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let removed = self.live.lock().remove(id);
        if removed {
            self.client.release_callback(id);
            Metrics::subscription_closed();
            debug!(id = %id, "Unsubscribed");
        }
        removed
    }

    /// Number of subscriptions registered through this bus and still live.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_live(&self, id: &SubscriptionId) -> bool {
        self.live.lock().contains(id)
    }
}

fn guard_handler(topic: &Topic, handler: MessageHandler) -> MessageHandler {
    let label = topic.to_string();
    let kind = topic.kind();
    Arc::new(move |message: &str| {
        Metrics::event_received(kind);
        if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
            Metrics::event_dropped(kind, DropReason::HandlerPanic);
            error!(topic = %label, "Handler panicked; message dropped");
        }
    })
}
