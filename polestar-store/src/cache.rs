//! Per-endpoint response cache.
//!
//! One entry per endpoint, overwritten in place. Stale entries are kept so
//! they can be served when a fresh fetch is not possible.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use polestar_core::{EndpointId, SharedClock};
use serde_json::Value;
use tracing::debug;

/// The last payload fetched for one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Endpoint the payload came from.
    pub endpoint: EndpointId,
    /// Raw payload, shared between readers.
    pub payload: Arc<Value>,
    /// When the payload was stored.
    pub fetched_at: DateTime<Utc>,
    /// Freshness window.
    pub ttl: Duration,
}

impl CacheEntry {
    /// When the entry stops being fresh.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.fetched_at + self.ttl
    }

    /// Returns true if the entry is fresh at `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

/// Result of [`EndpointCache::store`].
#[derive(Debug, Clone)]
pub struct Stored {
    /// The entry now in the cache.
    pub entry: CacheEntry,
    /// Whether the payload differs from the previous one. The first store
    /// for an endpoint counts as a change.
    pub changed: bool,
}

/// Cache of the latest payload per endpoint.
pub struct EndpointCache {
    clock: SharedClock,
    entries: RwLock<HashMap<EndpointId, CacheEntry>>,
}

impl EndpointCache {
    /// Creates an empty cache.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the entry for `endpoint`, fresh or stale.
    pub fn get(&self, endpoint: EndpointId) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&endpoint)
            .cloned()
    }

    /// Returns the entry only if it is still fresh.
    pub fn get_fresh(&self, endpoint: EndpointId) -> Option<CacheEntry> {
        self.get(endpoint).filter(|entry| self.is_fresh(entry))
    }

    /// Returns true if `entry` is fresh now.
    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        entry.is_fresh_at(self.clock.now())
    }

    /// Replaces the entry for `endpoint`, stamping it with the current time.
    pub fn store(&self, endpoint: EndpointId, payload: Value, ttl: Duration) -> Stored {
        let entry = CacheEntry {
            endpoint,
            payload: Arc::new(payload),
            fetched_at: self.clock.now(),
            ttl,
        };

        let previous = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(endpoint, entry.clone());
        let changed = previous.is_none_or(|old| old.payload != entry.payload);

        debug!(endpoint = %endpoint, changed, "Cache updated");
        Stored { entry, changed }
    }

    /// Number of cached endpoints.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EndpointCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}
