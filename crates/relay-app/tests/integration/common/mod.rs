//! Shared fixtures.

use parking_lot::Mutex;
use relay_app::{AppConfig, InMemoryStore, KeyValueStore, Session};
use relay_bus::InMemoryRelayer;
use relay_feed::{Notifier, Toast, ToastId};
use std::sync::Arc;

/// Notifier that records every shown toast and never reports one as still
/// visible.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    shown: Arc<Mutex<Vec<Toast>>>,
}

impl RecordingNotifier {
    pub fn shown(&self) -> Vec<ToastId> {
        self.shown.lock().iter().map(|t| t.id).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn is_active(&self, _id: ToastId) -> bool {
        false
    }

    fn show(&self, toast: Toast) {
        self.shown.lock().push(toast);
    }
}

/// Defaults with a fast poller.
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.progress.poll_interval_ms = 10;
    config
}

pub struct Harness {
    pub relayer: Arc<InMemoryRelayer>,
    pub session: Session,
    pub notifier: RecordingNotifier,
}

pub fn harness(config: &AppConfig) -> Harness {
    harness_with_store(config, Arc::new(InMemoryStore::new()))
}

pub fn harness_with_store(config: &AppConfig, store: Arc<dyn KeyValueStore>) -> Harness {
    let relayer = Arc::new(InMemoryRelayer::new());
    let notifier = RecordingNotifier::default();
    let session = Session::new(config, relayer.clone(), Box::new(notifier.clone()), store)
        .expect("session");
    Harness {
        relayer,
        session,
        notifier,
    }
}

pub fn order_event(kind: &str, id: &str, state: &str, local: bool, ts: u64) -> String {
    serde_json::json!({
        "type": kind,
        "order": {
            "id": id,
            "public_share_nullifier": format!("0x{id}"),
            "local": local,
            "cluster": "cluster-0",
            "state": state,
            "timestamp": ts,
        }
    })
    .to_string()
}

pub fn handshake_event(kind: &str, id: &str) -> String {
    serde_json::json!({ "type": kind, "local_order_id": id }).to_string()
}
