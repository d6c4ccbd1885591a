//! Subscription registry
//!
//! The registry is the single source of truth for active subscriptions.
//! It is an ordinary value: construct one (or let [`EventBus`] construct
//! one) and hand references to whoever needs it.
//!
//! ## Thread Safety
//!
//! The subscription set sits behind a `parking_lot::RwLock`. Matching takes
//! a read lock and returns `Arc` clones, so dispatch never runs handlers
//! while the lock is held.
//!
//! [`EventBus`]: super::bus::EventBus

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use super::event::Event;
use super::filter::{EventFilter, FilterCriteria};
use super::subscription::{EventHandler, Subscription, SubscriptionId, SubscriptionInfo};
use crate::error::Result;

/// Registry of event subscriptions
#[derive(Debug, Default)]
pub struct EventRegistry {
    /// Keyed by the numeric id, so iteration follows insertion order
    subscriptions: RwLock<BTreeMap<u64, Arc<Subscription>>>,
    next_id: AtomicU64,
}

impl EventRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events matching `criteria`
    ///
    /// Fails when `criteria` is empty.
    pub fn subscribe<F>(&self, criteria: FilterCriteria, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_handler(criteria, Arc::new(handler))
    }

    /// Same as [`subscribe`](Self::subscribe) for an already shared handler
    pub fn subscribe_handler(
        &self,
        criteria: FilterCriteria,
        handler: EventHandler,
    ) -> Result<SubscriptionId> {
        let filter = EventFilter::new(criteria)?;
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let subscription = Arc::new(Subscription::new(id, filter, handler));

        debug!(subscription = %id, filter = %subscription.filter(), "Subscription added");
        self.subscriptions.write().insert(id.0, subscription);
        Ok(id)
    }

    /// Deactivate and remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.write().remove(&id.0);
        match removed {
            Some(subscription) => {
                subscription.deactivate();
                debug!(subscription = %id, "Subscription removed");
                true
            }
            None => false,
        }
    }

    /// Active subscriptions whose filter matches `event`, in insertion order
    pub fn get_matching_subscriptions(&self, event: &Event) -> Vec<Arc<Subscription>> {
        self.subscriptions
            .read()
            .values()
            .filter(|s| s.matches(event))
            .cloned()
            .collect()
    }

    /// Remove every subscription, or only those registered for `event_type`
    ///
    /// Returns the number removed.
    pub fn clear_subscriptions(&self, event_type: Option<&str>) -> usize {
        let mut subscriptions = self.subscriptions.write();

        let doomed: Vec<u64> = subscriptions
            .iter()
            .filter(|(_, s)| match event_type {
                Some(t) => s.filter().event_type() == Some(t),
                None => true,
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &doomed {
            if let Some(subscription) = subscriptions.remove(id) {
                subscription.deactivate();
            }
        }
        doomed.len()
    }

    /// Number of active subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .read()
            .values()
            .filter(|s| s.is_active())
            .count()
    }

    /// Diagnostic view of one subscription
    pub fn subscription_info(&self, id: SubscriptionId) -> Option<SubscriptionInfo> {
        self.subscriptions.read().get(&id.0).map(|s| s.info())
    }

    /// Snapshot of subscriptions, optionally only those for `event_type`
    pub fn get_subscriptions(&self, event_type: Option<&str>) -> Vec<Arc<Subscription>> {
        self.subscriptions
            .read()
            .values()
            .filter(|s| match event_type {
                Some(t) => s.filter().event_type() == Some(t),
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Distinct exact-type or pattern criteria among active subscriptions
    pub fn active_event_types(&self) -> usize {
        let subscriptions = self.subscriptions.read();
        let mut keys = BTreeSet::new();
        for s in subscriptions.values().filter(|s| s.is_active()) {
            if let Some(t) = s.filter().event_type() {
                keys.insert(t.to_string());
            } else if let Some(p) = s.filter().pattern() {
                keys.insert(p.to_string());
            }
        }
        keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event::SystemPayload;

    fn event(event_type: &str) -> Event {
        Event::new(event_type, "test", SystemPayload::new("test", "op", "ok")).unwrap()
    }

    fn noop(_: &Event) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn test_subscribe_requires_criteria() {
        let registry = EventRegistry::new();
        assert!(registry.subscribe(FilterCriteria::new(), noop).is_err());
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn test_ids_increase() {
        let registry = EventRegistry::new();
        let a = registry.subscribe(FilterCriteria::new().pattern("*"), noop).unwrap();
        let b = registry.subscribe(FilterCriteria::new().pattern("*"), noop).unwrap();

        assert!(b > a);
        assert_eq!(a.to_string(), "sub_1");
        assert_eq!(b.to_string(), "sub_2");
    }

    #[test]
    fn test_unsubscribe_twice() {
        let registry = EventRegistry::new();
        let id = registry.subscribe(FilterCriteria::new().pattern("*"), noop).unwrap();

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert!(registry.get_matching_subscriptions(&event("a")).is_empty());
    }

    #[test]
    fn test_matching_is_in_insertion_order() {
        let registry = EventRegistry::new();
        let first = registry.subscribe(FilterCriteria::new().pattern("dns.*"), noop).unwrap();
        registry.subscribe(FilterCriteria::new().event_type("system.started"), noop).unwrap();
        let third = registry
            .subscribe(FilterCriteria::new().event_type("dns.record.added"), noop)
            .unwrap();

        let ids: Vec<_> = registry
            .get_matching_subscriptions(&event("dns.record.added"))
            .iter()
            .map(|s| s.id())
            .collect();
        assert_eq!(ids, vec![first, third]);
    }

    #[test]
    fn test_clear_by_event_type() {
        let registry = EventRegistry::new();
        registry.subscribe(FilterCriteria::new().event_type("a"), noop).unwrap();
        registry.subscribe(FilterCriteria::new().event_type("a"), noop).unwrap();
        let keep = registry.subscribe(FilterCriteria::new().event_type("b"), noop).unwrap();

        assert_eq!(registry.clear_subscriptions(Some("a")), 2);
        assert_eq!(registry.subscription_count(), 1);
        assert!(registry.subscription_info(keep).unwrap().active);

        assert_eq!(registry.clear_subscriptions(None), 1);
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn test_info_and_listing() {
        let registry = EventRegistry::new();
        let id = registry
            .subscribe(FilterCriteria::new().event_type("system.started"), noop)
            .unwrap();
        registry.subscribe(FilterCriteria::new().pattern("dns.*"), noop).unwrap();

        let info = registry.subscription_info(id).unwrap();
        assert_eq!(info.id, "sub_1");
        assert_eq!(info.filter, "EventFilter(type=system.started)");

        assert_eq!(registry.get_subscriptions(None).len(), 2);
        assert_eq!(registry.get_subscriptions(Some("system.started")).len(), 1);
        assert_eq!(registry.active_event_types(), 2);
    }
}
