//! Publish/subscribe event system
//!
//! - [`event`]: immutable event values with typed category payloads
//! - [`filter`]: conjunctive predicates over events
//! - [`subscription`]: filter + handler bindings
//! - [`registry`]: the set of live subscriptions
//! - [`bus`]: synchronous dispatch with per-handler failure isolation

pub mod bus;
pub mod event;
pub mod filter;
pub mod registry;
pub mod subscription;

pub use bus::{BusStats, EventBus};
pub use event::{
    ContainerPayload, DnsPayload, ErrorPayload, Event, EventBuilder, EventKind, EventPayload,
    FilePayload, FileRecord, HealthPayload, HealthStatus, NodePayload, Severity, SystemPayload,
    types,
};
pub use filter::{EventFilter, EventPredicate, FilterCriteria};
pub use registry::EventRegistry;
pub use subscription::{EventHandler, Subscription, SubscriptionId, SubscriptionInfo};
