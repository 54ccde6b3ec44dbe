//! Precision-safe decimal price type.
//!
//! Uses `rust_decimal` for exact decimal arithmetic so that rounding a
//! midpoint to a display precision is deterministic.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of decimal places used when comparing midpoints by default.
pub const DEFAULT_PRICE_PRECISION: u32 = 2;

/// Price with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Round to `precision` decimal places, halves away from zero.
    #[inline]
    pub fn rounded(&self, precision: u32) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Render with exactly `precision` fractional digits.
    pub fn formatted(&self, precision: u32) -> String {
        format!("{:.*}", precision as usize, self.rounded(precision).0)
    }

    /// Whether two prices render identically at `precision`.
    #[inline]
    pub fn same_at(&self, other: Price, precision: u32) -> bool {
        self.rounded(precision) == other.rounded(precision)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rounded_default_precision() {
        let px = Price::new(dec!(1800.004));
        assert_eq!(px.rounded(DEFAULT_PRICE_PRECISION), Price::new(dec!(1800.00)));
    }

    #[test]
    fn test_rounded_midpoint_away_from_zero() {
        let px = Price::new(dec!(1800.005));
        assert_eq!(px.rounded(2), Price::new(dec!(1800.01)));
    }

    #[test]
    fn test_formatted_pads_fraction() {
        assert_eq!(Price::new(dec!(1800)).formatted(2), "1800.00");
        assert_eq!(Price::new(dec!(0.123456)).formatted(4), "0.1235");
    }

    #[test]
    fn test_same_at() {
        let a = Price::new(dec!(1800.001));
        let b = Price::new(dec!(1800.004));
        assert!(a.same_at(b, 2));
        assert!(!a.same_at(b, 3));
    }

    #[test]
    fn test_parse() {
        let px: Price = "1799.95".parse().unwrap();
        assert_eq!(px, Price::new(dec!(1799.95)));
    }
}
