//! Integration tests for relay-app.
//!
//! These tests drive whole sessions through an in-memory relayer:
//! - Subscription lifecycle across stores
//! - Order book and handshake reconciliation
//! - Task progress over the live poller
//! - Event log replay

pub mod common;
