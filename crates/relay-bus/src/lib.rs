//! Relayer push-subscription adapter.
//!
//! Provides:
//! - `RelayerClient`: the upstream callback registration API
//! - `EventBus`: subscribe/unsubscribe with idempotent release and
//!   contained handler failures
//! - `SubscriptionManager`: at most one upstream subscription per topic per
//!   owning scope, reference counted, with teardown that discards late
//!   registrations
//! - `InMemoryRelayer`: in-process relayer for tests and event replay

pub mod bus;
pub mod client;
pub mod error;
pub mod memory;
pub mod subscription;

pub use bus::EventBus;
pub use client::{
    health_query_pair, ExchangeHealth, ExchangeHealthReport, HealthQuery, MessageHandler,
    RelayerClient, SubscriptionId, Topic,
};
pub use error::{BusError, BusResult};
pub use memory::{InMemoryRelayer, RegistrationMode};
pub use subscription::{Lease, SubscriptionManager};
