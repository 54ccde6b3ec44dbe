//! Price report cache.
//!
//! Holds at most one report per exchange/base/quote key and decides, per
//! incoming report, whether observers should be notified:
//!
//! 1. Within `throttle` of the last published report for the key, the
//!    report is dropped unconditionally.
//! 2. Otherwise it is published if no report is stored yet or the midpoint
//!    differs from the stored one at the key's precision.
//! 3. A report that only differs at full precision replaces the stored
//!    value silently (no notification, throttle window untouched).
//!
//! The throttle anchor is an explicit field per key so it can be inspected
//! without going through a subscription.

use dashmap::DashMap;
use parking_lot::RwLock;
use relay_core::{PriceKey, PriceReport, DEFAULT_PRICE_PRECISION};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Cache behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceCacheConfig {
    /// Decimal places compared when no observer asked for a precision.
    pub default_precision: u32,
    /// Minimum spacing between published reports for one key.
    pub throttle: Duration,
}

impl Default for PriceCacheConfig {
    fn default() -> Self {
        Self {
            default_precision: DEFAULT_PRICE_PRECISION,
            throttle: Duration::from_millis(1000),
        }
    }
}

/// Outcome of offering a report to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceDecision {
    /// Stored and sent to observers.
    Published,
    /// Stored without notifying observers.
    Refreshed,
    /// Dropped: inside the throttle window.
    Throttled,
    /// Dropped: identical midpoint.
    Unchanged,
}

impl PriceDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Refreshed => "refreshed",
            Self::Throttled => "throttled",
            Self::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug)]
struct PriceEntry {
    report: Option<PriceReport>,
    precision: u32,
    last_published_at: Option<Instant>,
    tx: watch::Sender<Option<PriceReport>>,
}

impl PriceEntry {
    fn new(precision: u32) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            report: None,
            precision,
            last_published_at: None,
            tx,
        }
    }
}

type StateEntry = Arc<RwLock<PriceEntry>>;

/// Per-key price report store.
pub struct PriceCache {
    config: PriceCacheConfig,
    entries: DashMap<PriceKey, StateEntry>,
}

impl PriceCache {
    pub fn new(config: PriceCacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    pub fn config(&self) -> &PriceCacheConfig {
        &self.config
    }

    /// Get or create the entry for `key`. The precision is fixed by whoever
    /// creates the entry.
    fn get_or_create(&self, key: &PriceKey, precision: Option<u32>) -> StateEntry {
        self.entries
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(RwLock::new(PriceEntry::new(
                    precision.unwrap_or(self.config.default_precision),
                )))
            })
            .clone()
    }

    /// Observe `key`: returns a receiver whose current value is the latest
    /// published report and which changes on every publication.
    pub fn watch(&self, key: &PriceKey, precision: Option<u32>) -> watch::Receiver<Option<PriceReport>> {
        self.get_or_create(key, precision).read().tx.subscribe()
    }

    /// Offer a report received at `now`.
    pub fn offer(&self, report: PriceReport, now: Instant) -> PriceDecision {
        let entry = self.get_or_create(&report.key, None);
        let mut entry = entry.write();

        if let Some(last) = entry.last_published_at {
            if now.saturating_duration_since(last) <= self.config.throttle {
                trace!(key = %report.key, "Price report throttled");
                return PriceDecision::Throttled;
            }
        }

        let precision = entry.precision;
        let decision = match &entry.report {
            None => PriceDecision::Published,
            Some(prev) if !prev.midpoint_price.same_at(report.midpoint_price, precision) => {
                PriceDecision::Published
            }
            Some(prev) if prev.midpoint_price != report.midpoint_price => PriceDecision::Refreshed,
            Some(_) => PriceDecision::Unchanged,
        };

        match decision {
            PriceDecision::Published => {
                debug!(
                    key = %report.key,
                    midpoint = %report.midpoint_price.formatted(precision),
                    "Price published"
                );
                entry.last_published_at = Some(now);
                entry.report = Some(report.clone());
                entry.tx.send_replace(Some(report));
            }
            PriceDecision::Refreshed => {
                entry.report = Some(report);
            }
            PriceDecision::Throttled | PriceDecision::Unchanged => {}
        }
        decision
    }

    /// Latest stored report for `key`.
    pub fn get(&self, key: &PriceKey) -> Option<PriceReport> {
        self.entries
            .get(key)
            .and_then(|entry| entry.read().report.clone())
    }

    /// Time of the last published report for `key`.
    pub fn last_published_at(&self, key: &PriceKey) -> Option<Instant> {
        self.entries
            .get(key)
            .and_then(|entry| entry.read().last_published_at)
    }

    pub fn precision(&self, key: &PriceKey) -> u32 {
        self.entries
            .get(key)
            .map(|entry| entry.read().precision)
            .unwrap_or(self.config.default_precision)
    }

    pub fn keys(&self) -> Vec<PriceKey> {
        let mut keys: Vec<PriceKey> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// All stored reports, ordered by key.
    pub fn snapshot(&self) -> Vec<PriceReport> {
        self.keys().iter().filter_map(|k| self.get(k)).collect()
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new(PriceCacheConfig::default())
    }
}
