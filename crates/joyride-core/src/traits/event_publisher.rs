// # Event Publisher Trait
//
// The seam between event producers (the hosts detector, the daemon, external
// container or cluster monitors) and the bus that dispatches their events.
//
// A producer holds an `Arc<dyn EventPublisher>` set once at wiring time. The
// bus never owns its producers.
//
// ## Usage
//
// ```rust,ignore
// use std::sync::Arc;
// use joyride_core::{EventBus, EventPublisher};
//
// let bus = Arc::new(EventBus::new());
// let publisher: Arc<dyn EventPublisher> = bus.clone();
// let handled = publisher.publish(&event);
// ```

use crate::events::Event;

/// Anything that can dispatch events to subscribers
pub trait EventPublisher: Send + Sync {
    /// Deliver `event`; returns how many handlers completed successfully
    ///
    /// Must not fail: delivery problems are the publisher's to log.
    fn publish(&self, event: &Event) -> usize;
}
