//! Event bus
//!
//! Facade over an [`EventRegistry`] that adds dispatch, bookkeeping and an
//! active/inactive lifecycle.
//!
//! ## Dispatch
//!
//! `publish` is synchronous. Matching handlers run one after another on the
//! caller's thread, in registry order. A handler that returns `Err` or
//! panics is logged and skipped; the remaining handlers still run. The
//! return value counts the handlers that completed successfully.
//!
//! ## Shutdown
//!
//! `shutdown` is idempotent. Afterwards `publish` returns 0 with a warning
//! and subscription management returns [`Error::BusInactive`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::event::Event;
use super::filter::FilterCriteria;
use super::registry::EventRegistry;
use super::subscription::{SubscriptionId, SubscriptionInfo};
use crate::error::{Error, Result};
use crate::traits::EventPublisher;

/// Diagnostic snapshot returned by [`EventBus::get_stats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusStats {
    pub total_events_published: u64,
    pub active_event_types: usize,
    pub total_subscriptions: usize,
    pub is_active: bool,
}

/// Thread-safe publish/subscribe bus
#[derive(Debug)]
pub struct EventBus {
    registry: EventRegistry,
    /// Guards the active flag; subscription changes hold it shared
    active: RwLock<bool>,
    events_published: AtomicU64,
}

impl EventBus {
    /// Create an active bus with its own registry
    pub fn new() -> Self {
        Self::with_registry(EventRegistry::new())
    }

    /// Create an active bus over an existing registry
    pub fn with_registry(registry: EventRegistry) -> Self {
        Self {
            registry,
            active: RwLock::new(true),
            events_published: AtomicU64::new(0),
        }
    }

    /// Underlying registry
    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn is_active(&self) -> bool {
        *self.active.read()
    }

    /// Subscribe `handler` to events matching `criteria`
    pub fn subscribe<F>(&self, criteria: FilterCriteria, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let active = self.active.read();
        if !*active {
            return Err(Error::BusInactive);
        }
        self.registry.subscribe_handler(criteria, Arc::new(handler))
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        let active = self.active.read();
        if !*active {
            return Err(Error::BusInactive);
        }
        Ok(self.registry.unsubscribe(id))
    }

    /// Remove all subscriptions, or those registered for `event_type`
    pub fn clear_subscriptions(&self, event_type: Option<&str>) -> Result<usize> {
        let active = self.active.read();
        if !*active {
            return Err(Error::BusInactive);
        }
        Ok(self.registry.clear_subscriptions(event_type))
    }

    /// Deliver `event` to every matching subscriber
    ///
    /// Returns the number of handlers that completed without error.
    pub fn publish(&self, event: &Event) -> usize {
        if !self.is_active() {
            warn!(
                event_type = event.event_type(),
                event_id = event.id(),
                "Event bus is not active, dropping event"
            );
            return 0;
        }

        self.events_published.fetch_add(1, Ordering::Relaxed);
        let subscriptions = self.registry.get_matching_subscriptions(event);

        debug!(
            event_type = event.event_type(),
            event_id = event.id(),
            subscribers = subscriptions.len(),
            "Publishing event"
        );

        let mut handled = 0;
        for subscription in subscriptions {
            if !subscription.is_active() {
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| subscription.handle(event))) {
                Ok(Ok(())) => handled += 1,
                Ok(Err(e)) => {
                    error!(
                        event_type = event.event_type(),
                        event_id = event.id(),
                        subscription = %subscription.id(),
                        error = %e,
                        "Event handler failed"
                    );
                }
                Err(panic) => {
                    error!(
                        event_type = event.event_type(),
                        event_id = event.id(),
                        subscription = %subscription.id(),
                        panic = panic_message(panic.as_ref()),
                        "Event handler panicked"
                    );
                }
            }
        }
        handled
    }

    /// Deactivate the bus and drop every subscription (idempotent)
    pub fn shutdown(&self) {
        let mut active = self.active.write();
        if !*active {
            return;
        }
        *active = false;
        let removed = self.registry.clear_subscriptions(None);
        info!(subscriptions = removed, "Event bus shut down");
    }

    /// Diagnostic snapshot
    pub fn get_stats(&self) -> BusStats {
        BusStats {
            total_events_published: self.events_published.load(Ordering::Relaxed),
            active_event_types: self.registry.active_event_types(),
            total_subscriptions: self.registry.subscription_count(),
            is_active: self.is_active(),
        }
    }

    /// Diagnostic view of one subscription
    pub fn subscription_info(&self, id: SubscriptionId) -> Option<SubscriptionInfo> {
        self.registry.subscription_info(id)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: &Event) -> usize {
        EventBus::publish(self, event)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
