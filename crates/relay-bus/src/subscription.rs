//! Subscription lifecycle management.
//!
//! Each topic has at most one upstream subscription per manager. A manager
//! belongs to one owning scope (a session, a view) and releases everything
//! it registered on `release_all`.
//!
//! Registration is asynchronous. A registration that resolves after its
//! entry was released (by `release`, `release_all`, or a newer registration
//! for the same topic) is discarded and its upstream callback is released
//! immediately, so nothing leaks and no store sees the late subscription.

use crate::bus::EventBus;
use crate::client::{MessageHandler, SubscriptionId, Topic};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    /// Registration in flight.
    Pending,
    Live(SubscriptionId),
}

#[derive(Debug)]
struct Entry {
    /// Registration attempt that created this entry.
    token: u64,
    slot: Slot,
    /// Observers holding this topic via `acquire`.
    refs: u32,
}

#[derive(Debug, Default)]
struct Registry {
    entries: HashMap<Topic, Entry>,
    next_token: u64,
}

impl Registry {
    fn is_current(&self, topic: &Topic, token: u64) -> bool {
        self.entries.get(topic).is_some_and(|e| e.token == token)
    }
}

/// Reference on a topic taken by `acquire`.
///
/// Bound to the registration it was taken on: once that registration is
/// gone (released, failed, or cleared by `release_all`), handing the lease
/// back is a no-op.
#[derive(Debug, PartialEq, Eq)]
pub struct Lease {
    topic: Topic,
    token: u64,
    id: Option<SubscriptionId>,
}

impl Lease {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Upstream id, if the registration was live when the lease was taken.
    pub fn id(&self) -> Option<&SubscriptionId> {
        self.id.as_ref()
    }
}

/// Removes a pending entry if its registration future is dropped before
/// resolving.
struct PendingGuard<'a> {
    registry: &'a Mutex<Registry>,
    topic: &'a Topic,
    token: u64,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut registry = self.registry.lock();
        let abandoned = registry
            .entries
            .get(self.topic)
            .is_some_and(|e| e.token == self.token && e.slot == Slot::Pending);
        if abandoned {
            registry.entries.remove(self.topic);
            debug!(topic = %self.topic, "Registration cancelled before resolving");
        }
    }
}

/// Per-scope subscription registry.
pub struct SubscriptionManager {
    bus: Arc<EventBus>,
    registry: Mutex<Registry>,
}

impl SubscriptionManager {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Register `topic` through `factory` unless it already has a live or
    /// in-flight subscription.
    ///
    /// Returns the live id, or `None` if registration is in flight elsewhere,
    /// failed, or was discarded by a concurrent release.
    pub async fn ensure_subscribed<F, Fut>(&self, topic: Topic, factory: F) -> Option<SubscriptionId>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<SubscriptionId>>,
    {
        {
            let registry = self.registry.lock();
            if let Some(entry) = registry.entries.get(&topic) {
                return live_id(&entry.slot);
            }
        }
        self.register(&topic, 0, factory).await.1
    }

    /// `ensure_subscribed` with the bus as the factory.
    pub async fn ensure_handler(&self, topic: Topic, handler: MessageHandler) -> Option<SubscriptionId> {
        let bus = self.bus.clone();
        let t = topic.clone();
        self.ensure_subscribed(topic, || async move { bus.subscribe(&t, handler).await })
            .await
    }

    /// Take a reference on `topic`, registering it through `factory` if this
    /// is the first reference.
    pub async fn acquire<F, Fut>(&self, topic: Topic, factory: F) -> Lease
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<SubscriptionId>>,
    {
        {
            let mut registry = self.registry.lock();
            if let Some(entry) = registry.entries.get_mut(&topic) {
                entry.refs += 1;
                return Lease {
                    token: entry.token,
                    id: live_id(&entry.slot),
                    topic,
                };
            }
        }
        let (token, id) = self.register(&topic, 1, factory).await;
        Lease { topic, token, id }
    }

    /// Hand back a lease; the upstream subscription is released with the
    /// last reference. Returns false (and changes nothing) when the lease's
    /// registration is no longer the current one for its topic.
    pub fn release(&self, lease: Lease) -> bool {
        let topic = &lease.topic;
        let released = {
            let mut registry = self.registry.lock();
            if !registry.is_current(topic, lease.token) {
                debug!(topic = %topic, "Ignoring stale lease");
                return false;
            }
            let Some(entry) = registry.entries.get_mut(topic) else {
                return false;
            };
            if entry.refs == 0 {
                return false;
            }
            entry.refs -= 1;
            if entry.refs > 0 {
                return true;
            }
            registry.entries.remove(topic).map(|e| e.slot)
        };

        if let Some(Slot::Live(id)) = released {
            self.bus.unsubscribe(&id);
        }
        debug!(topic = %topic, "Released last reference");
        true
    }

    /// Release every subscription and forget all entries. Safe to call any
    /// number of times.
    pub fn release_all(&self) {
        let drained: Vec<(Topic, Entry)> = self.registry.lock().entries.drain().collect();
        if drained.is_empty() {
            return;
        }

        let count = drained.len();
        for (_, entry) in drained {
            if let Slot::Live(id) = entry.slot {
                self.bus.unsubscribe(&id);
            }
        }
        info!(count, "Released all subscriptions");
    }

    pub fn is_live(&self, topic: &Topic) -> bool {
        self.registry
            .lock()
            .entries
            .get(topic)
            .is_some_and(|e| matches!(e.slot, Slot::Live(_)))
    }

    pub fn ref_count(&self, topic: &Topic) -> u32 {
        self.registry
            .lock()
            .entries
            .get(topic)
            .map(|e| e.refs)
            .unwrap_or(0)
    }

    /// Topics with a live or in-flight subscription.
    pub fn topic_count(&self) -> usize {
        self.registry.lock().entries.len()
    }

    async fn register<F, Fut>(&self, topic: &Topic, refs: u32, factory: F) -> (u64, Option<SubscriptionId>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<SubscriptionId>>,
    {
        let token = {
            let mut registry = self.registry.lock();
            // Re-check: another caller may have registered while we were
            // between locks.
            if let Some(entry) = registry.entries.get_mut(topic) {
                entry.refs += refs;
                return (entry.token, live_id(&entry.slot));
            }
            registry.next_token += 1;
            let token = registry.next_token;
            registry.entries.insert(
                topic.clone(),
                Entry {
                    token,
                    slot: Slot::Pending,
                    refs,
                },
            );
            token
        };

        let mut guard = PendingGuard {
            registry: &self.registry,
            topic,
            token,
            armed: true,
        };
        let result = factory().await;
        guard.armed = false;

        let mut registry = self.registry.lock();
        if !registry.is_current(topic, token) {
            drop(registry);
            if let Some(id) = result {
                debug!(topic = %topic, id = %id, "Discarding registration that resolved after release");
                self.bus.unsubscribe(&id);
            }
            return (token, None);
        }

        match result {
            Some(id) => {
                if let Some(entry) = registry.entries.get_mut(topic) {
                    entry.slot = Slot::Live(id.clone());
                }
                (token, Some(id))
            }
            None => {
                registry.entries.remove(topic);
                (token, None)
            }
        }
    }
}

fn live_id(slot: &Slot) -> Option<SubscriptionId> {
    match slot {
        Slot::Live(id) => Some(id.clone()),
        Slot::Pending => None,
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryRelayer, RegistrationMode};
    use relay_core::{Exchange, PriceKey, Ticker};
    use std::time::Duration;

    fn setup() -> (Arc<InMemoryRelayer>, Arc<SubscriptionManager>) {
        let relayer = Arc::new(InMemoryRelayer::new());
        let bus = Arc::new(EventBus::new(relayer.clone()));
        (relayer, Arc::new(SubscriptionManager::new(bus)))
    }

    fn noop() -> MessageHandler {
        Arc::new(|_msg: &str| {})
    }

    fn price_topic() -> Topic {
        Topic::PriceReport(PriceKey::new(
            Exchange::Binance,
            Ticker::new("ETH"),
            Ticker::new("USDC"),
        ))
    }

    #[tokio::test]
    async fn test_ensure_subscribed_is_idempotent() {
        let (relayer, manager) = setup();

        let first = manager.ensure_handler(Topic::OrderBook, noop()).await;
        let second = manager.ensure_handler(Topic::OrderBook, noop()).await;

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(relayer.registration_count(), 1);
        assert_eq!(relayer.handler_count(&Topic::OrderBook), 1);
    }

    #[tokio::test]
    async fn test_release_all_is_repeatable() {
        let (relayer, manager) = setup();
        manager.release_all();

        manager.ensure_handler(Topic::OrderBook, noop()).await;
        manager.ensure_handler(Topic::Mpc, noop()).await;
        assert_eq!(relayer.active_callbacks(), 2);

        manager.release_all();
        manager.release_all();
        assert_eq!(relayer.active_callbacks(), 0);
        assert_eq!(relayer.released_ids().len(), 2);
        assert_eq!(manager.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_registration_leaves_no_entry() {
        let (relayer, manager) = setup();
        relayer.set_mode(RegistrationMode::Fail);

        assert!(manager.ensure_handler(Topic::Mpc, noop()).await.is_none());
        assert!(!manager.is_live(&Topic::Mpc));
        assert_eq!(manager.topic_count(), 0);

        relayer.set_mode(RegistrationMode::Accept);
        assert!(manager.ensure_handler(Topic::Mpc, noop()).await.is_some());
    }

    #[tokio::test]
    async fn test_acquire_reference_counts() {
        let (relayer, manager) = setup();
        let topic = price_topic();

        let first = manager.acquire(topic.clone(), || manager.bus().subscribe(&topic, noop())).await;
        let second = manager.acquire(topic.clone(), || manager.bus().subscribe(&topic, noop())).await;
        assert!(first.id().is_some());
        assert_eq!(first.id(), second.id());
        assert_eq!(manager.ref_count(&topic), 2);
        assert_eq!(relayer.registration_count(), 1);

        assert!(manager.release(first));
        assert!(manager.is_live(&topic));
        assert_eq!(relayer.active_callbacks(), 1);

        assert!(manager.release(second));
        assert!(!manager.is_live(&topic));
        assert_eq!(manager.ref_count(&topic), 0);
        assert_eq!(relayer.active_callbacks(), 0);
        assert_eq!(relayer.released_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_lease_from_failed_registration_is_inert() {
        let (relayer, manager) = setup();
        let topic = price_topic();
        relayer.set_mode(RegistrationMode::Fail);

        let failed = manager.acquire(topic.clone(), || manager.bus().subscribe(&topic, noop())).await;
        assert!(failed.id().is_none());

        relayer.set_mode(RegistrationMode::Accept);
        let live = manager.acquire(topic.clone(), || manager.bus().subscribe(&topic, noop())).await;
        assert!(live.id().is_some());

        assert!(!manager.release(failed));
        assert!(manager.is_live(&topic));
        assert_eq!(manager.ref_count(&topic), 1);
    }

    #[tokio::test]
    async fn test_lease_outliving_release_all_is_stale() {
        let (relayer, manager) = setup();
        let topic = price_topic();

        let old = manager.acquire(topic.clone(), || manager.bus().subscribe(&topic, noop())).await;
        manager.release_all();
        let current = manager.acquire(topic.clone(), || manager.bus().subscribe(&topic, noop())).await;
        assert!(current.id().is_some());
        assert_ne!(old.id(), current.id());

        // The old lease must not touch the newer registration.
        assert!(!manager.release(old));
        assert!(manager.is_live(&topic));
        assert_eq!(manager.ref_count(&topic), 1);
        assert_eq!(relayer.active_callbacks(), 1);

        assert!(manager.release(current));
        assert_eq!(relayer.active_callbacks(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_registration_does_not_block_topic() {
        let (relayer, manager) = setup();
        relayer.pause_registrations();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            manager.ensure_handler(Topic::OrderBook, noop()),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(manager.topic_count(), 0);

        relayer.resume_registrations();
        let id = manager.ensure_handler(Topic::OrderBook, noop()).await;
        assert!(id.is_some());
        assert!(manager.is_live(&Topic::OrderBook));
        assert_eq!(relayer.active_callbacks(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_acquire_does_not_block_topic() {
        let (relayer, manager) = setup();
        let topic = price_topic();
        relayer.pause_registrations();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            manager.acquire(topic.clone(), || manager.bus().subscribe(&topic, noop())),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(manager.ref_count(&topic), 0);

        relayer.resume_registrations();
        let lease = manager.acquire(topic.clone(), || manager.bus().subscribe(&topic, noop())).await;
        assert!(lease.id().is_some());
        assert_eq!(manager.ref_count(&topic), 1);
    }

    #[tokio::test]
    async fn test_late_registration_after_teardown_is_discarded() {
        let (relayer, manager) = setup();
        relayer.pause_registrations();

        let m = manager.clone();
        let pending =
            tokio::spawn(async move { m.ensure_handler(Topic::OrderBook, noop()).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.topic_count(), 1);

        manager.release_all();
        assert_eq!(manager.topic_count(), 0);

        relayer.resume_registrations();
        let result = pending.await.unwrap();

        assert!(result.is_none());
        assert_eq!(manager.topic_count(), 0);
        assert_eq!(relayer.active_callbacks(), 0);
        assert_eq!(relayer.released_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_everything() {
        let (relayer, manager) = setup();
        manager.ensure_handler(Topic::Mpc, noop()).await;
        assert_eq!(relayer.active_callbacks(), 1);

        drop(manager);
        assert_eq!(relayer.active_callbacks(), 0);
    }
}
