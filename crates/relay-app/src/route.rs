//! Trading page route normalization.

use relay_bus::health_query_pair;
use relay_core::{contains_lowercase, Ticker};
use std::fmt;

/// Base/quote pair of a trading page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradingRoute {
    base: Ticker,
    quote: Ticker,
}

/// Outcome of resolving raw path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteResolution {
    /// Segments already canonical.
    Canonical(TradingRoute),
    /// Segments need normalizing; navigate to this path instead.
    Redirect(String),
}

impl TradingRoute {
    pub fn new(base: Ticker, quote: Ticker) -> Self {
        Self { base, quote }
    }

    /// Resolve raw `base`/`quote` path segments. A segment containing any
    /// lowercase ASCII letter triggers a redirect to the upper-cased pair.
    pub fn resolve(base: &str, quote: &str) -> RouteResolution {
        let route = Self::new(Ticker::new(base), Ticker::new(quote));
        if contains_lowercase(base) || contains_lowercase(quote) {
            RouteResolution::Redirect(route.path())
        } else {
            RouteResolution::Canonical(route)
        }
    }

    pub fn base(&self) -> &Ticker {
        &self.base
    }

    pub fn quote(&self) -> &Ticker {
        &self.quote
    }

    pub fn path(&self) -> String {
        format!("/{}/{}", self.base, self.quote)
    }

    /// Pair to query exchange health for on this page.
    pub fn health_pair(&self) -> (Ticker, Ticker) {
        health_query_pair(&self.base)
    }
}

impl fmt::Display for TradingRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
