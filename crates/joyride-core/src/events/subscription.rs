//! Subscriptions bind a filter to a handler

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use super::event::Event;
use super::filter::EventFilter;

/// Callback invoked for every matching event
///
/// Returning `Err` (or panicking) is reported by the bus and does not affect
/// delivery to other subscribers.
pub type EventHandler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Registry-assigned subscription identifier, rendered as `sub_<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    /// Numeric part of the id
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub_{}", self.0)
    }
}

/// Live binding of a filter and a handler
pub struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    handler: EventHandler,
    active: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, filter: EventFilter, handler: EventHandler) -> Self {
        Self {
            id,
            filter,
            handler,
            active: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Active and the filter matches
    pub fn matches(&self, event: &Event) -> bool {
        self.is_active() && self.filter.matches(event)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub(crate) fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.handler)(event)
    }

    /// Diagnostic summary
    pub fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            id: self.id.to_string(),
            active: self.is_active(),
            filter: self.filter.to_string(),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Diagnostic view of a subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionInfo {
    pub id: String,
    pub active: bool,
    pub filter: String,
}
