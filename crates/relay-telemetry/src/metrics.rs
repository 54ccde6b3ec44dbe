//! Prometheus metrics for relayer event synchronization.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a build-time mistake that should crash on
//! first use rather than silently drop data.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_int_gauge, register_int_gauge_vec, CounterVec, IntGauge,
    IntGaugeVec,
};

/// Total messages delivered by the relayer, per topic.
pub static EVENTS_RECEIVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_events_received_total",
        "Total push messages delivered by the relayer",
        &["topic"]
    )
    .unwrap()
});

/// Total messages dropped, per topic and reason.
pub static EVENTS_DROPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_events_dropped_total",
        "Total push messages dropped without a state change",
        &["topic", "reason"]
    )
    .unwrap()
});

/// Price report decisions, per decision.
pub static PRICE_DECISIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_price_decisions_total",
        "Price report cache decisions",
        &["decision"]
    )
    .unwrap()
});

/// Failed or id-less subscription registrations, per topic.
pub static REGISTRATION_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_registration_failures_total",
        "Subscription registrations that produced no callback id",
        &["topic"]
    )
    .unwrap()
});

/// Live upstream subscriptions.
pub static LIVE_SUBSCRIPTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "relay_live_subscriptions",
        "Upstream subscriptions currently registered"
    )
    .unwrap()
});

/// Last displayed task progress, per task type.
pub static TASK_PROGRESS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "relay_task_progress_percent",
        "Estimated task progress percentage",
        &["task_type"]
    )
    .unwrap()
});

/// Why a push message was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Undecodable payload or missing required fields.
    Malformed,
    /// Recognized topic, unrecognized event type.
    UnknownType,
    /// The handler panicked; the panic was contained.
    HandlerPanic,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::UnknownType => "unknown_type",
            Self::HandlerPanic => "handler_panic",
        }
    }
}

/// Typed recording facade over the static collectors.
pub struct Metrics;

impl Metrics {
    pub fn event_received(topic: &str) {
        EVENTS_RECEIVED_TOTAL.with_label_values(&[topic]).inc();
    }

    pub fn event_dropped(topic: &str, reason: DropReason) {
        EVENTS_DROPPED_TOTAL
            .with_label_values(&[topic, reason.as_str()])
            .inc();
    }

    /// Record a price cache decision (`published`, `refreshed`, `throttled`, `unchanged`).
    pub fn price_decision(decision: &str) {
        PRICE_DECISIONS_TOTAL.with_label_values(&[decision]).inc();
    }

    pub fn registration_failed(topic: &str) {
        REGISTRATION_FAILURES_TOTAL.with_label_values(&[topic]).inc();
    }

    pub fn subscription_opened() {
        LIVE_SUBSCRIPTIONS.inc();
    }

    pub fn subscription_closed() {
        LIVE_SUBSCRIPTIONS.dec();
    }

    pub fn task_progress(task_type: &str, percent: u8) {
        TASK_PROGRESS
            .with_label_values(&[task_type])
            .set(i64::from(percent));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_reason_labels() {
        assert_eq!(DropReason::Malformed.as_str(), "malformed");
        assert_eq!(DropReason::UnknownType.as_str(), "unknown_type");
        assert_eq!(DropReason::HandlerPanic.as_str(), "handler_panic");
    }

    #[test]
    fn test_counters_increment() {
        let before = EVENTS_DROPPED_TOTAL
            .with_label_values(&["test-topic", "malformed"])
            .get();
        Metrics::event_dropped("test-topic", DropReason::Malformed);
        let after = EVENTS_DROPPED_TOTAL
            .with_label_values(&["test-topic", "malformed"])
            .get();
        assert_eq!(after, before + 1.0);
    }
}
