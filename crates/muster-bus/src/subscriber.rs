//! Explicit per-channel subscriber sets.
//!
//! Callback fan-out is modeled as a first-class set with add/remove/clear
//! rather than an implicit global table, so a transport implementation can
//! reason about one channel's subscribers in isolation.

use crate::traits::{BusCallback, SubscriberId};

/// Ordered set of delivery callbacks for one channel.
#[derive(Default)]
pub struct SubscriberSet {
    next_id: u64,
    entries: Vec<(SubscriberId, BusCallback)>,
}

impl SubscriberSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback, returning its subscription handle.
    pub fn add(&mut self, callback: BusCallback) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    /// Remove one subscription. Unknown ids are a no-op.
    pub fn remove(&mut self, id: SubscriberId) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    /// Remove every subscription.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether the set has no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Snapshot of the callbacks in registration order.
    ///
    /// Deliveries iterate the snapshot so a callback that unsubscribes
    /// mid-delivery cannot invalidate the iteration.
    #[must_use]
    pub fn snapshot(&self) -> Vec<BusCallback> {
        self.entries.iter().map(|(_, cb)| cb.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::callback;

    fn noop() -> BusCallback {
        callback(|_payload| async {})
    }

    #[test]
    fn add_assigns_distinct_ids() {
        let mut set = SubscriberSet::new();
        let a = set.add(noop());
        let b = set.add(noop());
        assert_ne!(a, b);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn remove_by_id() {
        let mut set = SubscriberSet::new();
        let a = set.add(noop());
        let _b = set.add(noop());
        set.remove(a);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let mut set = SubscriberSet::new();
        let a = set.add(noop());
        set.remove(a);
        set.remove(a);
        assert!(set.is_empty());
    }

    #[test]
    fn clear_empties_set() {
        let mut set = SubscriberSet::new();
        let _ = set.add(noop());
        let _ = set.add(noop());
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn ids_not_reused_after_removal() {
        let mut set = SubscriberSet::new();
        let a = set.add(noop());
        set.remove(a);
        let b = set.add(noop());
        assert_ne!(a, b);
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let mut set = SubscriberSet::new();
        let _ = set.add(noop());
        let _ = set.add(noop());
        assert_eq!(set.snapshot().len(), 2);
    }
}
