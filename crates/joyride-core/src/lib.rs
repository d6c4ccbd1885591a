// # joyride-core
//
// Core library for the Joyride DNS service.
//
// ## Architecture Overview
//
// Hostnames are resolved from a live table built out of a directory of
// hosts files, and changes flow to interested parties over an event bus:
//
// - **RecordStore**: concurrent hostname -> IPv4 table
// - **DnsResponder**: UDP DNS responder answering A queries from the store
// - **HostsDetector**: polling loop diffing the hosts directory into deltas
// - **EventBus**: synchronous publish/subscribe with filtered subscriptions
// - **EventPublisher**: the handle producers hold to reach the bus
//
// ## Data Flow
//
// hosts files -> HostsDetector -> RecordStore -> DnsResponder
//                      |
//                      +-> EventBus -> subscribers
//
// Every component is an explicitly constructed value; there is no
// process-wide registry.

pub mod config;
pub mod error;
pub mod events;
pub mod hosts;
pub mod server;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{DnsConfig, HostsConfig, JoyrideConfig};
pub use error::{Error, Result};
pub use events::{
    BusStats, Event, EventBus, EventKind, EventPayload, EventRegistry, FilterCriteria,
    SubscriptionId,
};
pub use hosts::{DeltaAction, HostDelta, HostsDetector};
pub use server::{DnsResponder, ServiceState};
pub use store::RecordStore;
pub use traits::EventPublisher;
