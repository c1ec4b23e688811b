//! Field change subscriptions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use polestar_core::{EndpointId, Field, FieldValue};

/// Callback invoked with the new value of a subscribed field.
pub type Callback = Arc<dyn Fn(&FieldValue) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    field: Field,
    callback: Callback,
}

/// Registry of field subscriptions, keyed by registration order.
#[derive(Default)]
pub struct Subscriptions {
    next_id: AtomicU64,
    entries: RwLock<BTreeMap<SubscriptionId, Subscription>>,
}

impl Subscriptions {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `field`.
    pub fn subscribe(&self, field: Field, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Subscription { field, callback });
        id
    }

    /// Removes exactly the registration `id`. Returns false if it was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Snapshot of the callbacks for fields served by `endpoint`.
    ///
    /// Callers invoke the callbacks after the registry lock is released, so a
    /// callback may itself subscribe or unsubscribe.
    pub fn for_endpoint(&self, endpoint: EndpointId) -> Vec<(Field, Callback)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|sub| sub.field.endpoint() == endpoint)
            .map(|sub| (sub.field, Arc::clone(&sub.callback)))
            .collect()
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriptions")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
