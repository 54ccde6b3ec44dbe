//! Price report type.

use crate::decimal::Price;
use crate::market::PriceKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest midpoint for a price stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceReport {
    pub key: PriceKey,
    pub midpoint_price: Price,
    /// Local receive time.
    pub received_at: DateTime<Utc>,
}

impl PriceReport {
    pub fn new(key: PriceKey, midpoint_price: Price, received_at: DateTime<Utc>) -> Self {
        Self {
            key,
            midpoint_price,
            received_at,
        }
    }

    /// Midpoint rendered at `precision` decimal places.
    pub fn display_price(&self, precision: u32) -> String {
        self.midpoint_price.formatted(precision)
    }
}
