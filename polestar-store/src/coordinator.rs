//! Fetch coordination: cache, coalescing, budget, auth, and retry.
//!
//! Every read goes through [`FetchCoordinator::read_endpoint`]:
//!
//! 1. A fresh cache entry is returned without I/O.
//! 2. Otherwise a caller joins the in-flight fetch for the endpoint, or starts
//!    one if there is none. At most one upstream call per endpoint is ever
//!    outstanding, and every joined caller sees the same result.
//! 3. The fetch reserves budget, ensures a token, and calls the API with
//!    bounded retries. On failure it falls back to the stale entry.
//! 4. A changed payload is stored and subscribers of its fields notified.
//!
//! Fetches run on spawned tasks, so a caller that goes away does not cancel
//! a fetch other callers are waiting on.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use polestar_core::{
    EndpointCatalog, EndpointId, Field, FieldValue, SharedClock, project_field,
};
use polestar_fetch::{ApiClient, AuthError, FetchError, RequestBudget, RetryStrategy, TokenStore};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheEntry, EndpointCache};
use crate::diagnostics::{Diagnostics, EndpointStatus};
use crate::error::DataError;
use crate::subscriptions::{Callback, SubscriptionId, Subscriptions};

type SharedFetch = Shared<BoxFuture<'static, Result<CacheEntry, DataError>>>;

// ============================================================================
// Refresh Report
// ============================================================================

/// Outcome of [`FetchCoordinator::refresh_all`].
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    /// Endpoints whose cached payload is fresh.
    pub fresh: Vec<EndpointId>,
    /// Endpoints served from a stale entry after a failed or skipped fetch.
    pub stale: Vec<EndpointId>,
    /// Endpoints with no data at all.
    pub failed: Vec<(EndpointId, DataError)>,
}

impl RefreshReport {
    /// Returns true if every endpoint is fresh.
    pub fn is_complete(&self) -> bool {
        self.stale.is_empty() && self.failed.is_empty()
    }
}

// ============================================================================
// Coordinator
// ============================================================================

#[derive(Debug, Default, Clone)]
struct EndpointRecord {
    last_fetch: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    last_status: Option<u16>,
    last_error: Option<DataError>,
    calls: u64,
}

struct Inner {
    catalog: EndpointCatalog,
    cache: EndpointCache,
    budget: Arc<RequestBudget>,
    tokens: Arc<TokenStore>,
    client: ApiClient,
    retry: RetryStrategy,
    clock: SharedClock,
    subscriptions: Subscriptions,
    in_flight: Mutex<HashMap<EndpointId, SharedFetch>>,
    records: Mutex<HashMap<EndpointId, EndpointRecord>>,
    data_status: Mutex<Option<u16>>,
}

/// Removes the in-flight entry when the fetch task ends, including by panic.
struct InFlightGuard {
    inner: Arc<Inner>,
    endpoint: EndpointId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.endpoint);
    }
}

/// Decides, per endpoint, whether to serve from cache or call upstream.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<Inner>,
}

impl FetchCoordinator {
    /// Creates a coordinator over the given collaborators.
    pub fn new(
        catalog: EndpointCatalog,
        budget: Arc<RequestBudget>,
        tokens: Arc<TokenStore>,
        client: ApiClient,
        retry: RetryStrategy,
        clock: SharedClock,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                cache: EndpointCache::new(Arc::clone(&clock)),
                budget,
                tokens,
                client,
                retry,
                clock,
                subscriptions: Subscriptions::new(),
                in_flight: Mutex::new(HashMap::new()),
                records: Mutex::new(HashMap::new()),
                data_status: Mutex::new(None),
            }),
        }
    }

    /// The endpoints this coordinator serves.
    pub fn catalog(&self) -> &EndpointCatalog {
        &self.inner.catalog
    }

    /// The endpoint cache.
    pub fn cache(&self) -> &EndpointCache {
        &self.inner.cache
    }

    /// The request budget.
    pub fn budget(&self) -> &RequestBudget {
        &self.inner.budget
    }

    /// The session token store.
    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Reads one field, fetching its endpoint if the cache is not fresh.
    ///
    /// The returned value is marked stale when it came from an expired entry.
    pub async fn get_field(&self, field: Field) -> Result<FieldValue, DataError> {
        let endpoint = self.inner.catalog.endpoint_for(field)?.id;
        let entry = self.read_endpoint(endpoint).await?;
        let stale = !self.inner.cache.is_fresh(&entry);
        self.inner.project(field, &entry, stale)
    }

    /// Returns the payload of `endpoint`, from cache or upstream.
    pub async fn read_endpoint(&self, endpoint: EndpointId) -> Result<CacheEntry, DataError> {
        let ttl = self
            .inner
            .catalog
            .get(endpoint)
            .map(|e| e.ttl)
            .ok_or_else(|| DataError::UnknownField(endpoint.to_string()))?;

        if let Some(entry) = self.inner.cache.get_fresh(endpoint) {
            debug!(endpoint = %endpoint, "Cache hit");
            return Ok(entry);
        }

        let fetch = {
            let mut in_flight = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            // A fetch may have completed between the first check and the lock.
            if let Some(entry) = self.inner.cache.get_fresh(endpoint) {
                return Ok(entry);
            }

            if let Some(existing) = in_flight.get(&endpoint) {
                debug!(endpoint = %endpoint, "Joining in-flight fetch");
                existing.clone()
            } else {
                let fetch = self.spawn_fetch(endpoint, ttl);
                in_flight.insert(endpoint, fetch.clone());
                fetch
            }
        };

        fetch.await
    }

    /// Brings every endpoint up to date, honouring cache freshness.
    pub async fn refresh_all(&self) -> RefreshReport {
        let ids: Vec<EndpointId> = self.inner.catalog.ids().collect();
        let results = join_all(ids.iter().map(|id| self.read_endpoint(*id))).await;

        let mut report = RefreshReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(entry) if self.inner.cache.is_fresh(&entry) => report.fresh.push(id),
                Ok(_) => report.stale.push(id),
                Err(err) => report.failed.push((id, err)),
            }
        }

        info!(
            fresh = report.fresh.len(),
            stale = report.stale.len(),
            failed = report.failed.len(),
            "Refresh complete"
        );
        report
    }

    fn spawn_fetch(&self, endpoint: EndpointId, ttl: Duration) -> SharedFetch {
        let guard = InFlightGuard {
            inner: Arc::clone(&self.inner),
            endpoint,
        };

        let handle = tokio::spawn(async move {
            let result = guard.inner.fetch_and_store(endpoint, ttl).await;
            drop(guard);
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => Err(DataError::TaskFailed(err.to_string())),
            }
        }
        .boxed()
        .shared()
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Registers `callback` for changes to `field`.
    pub fn subscribe(&self, field: Field, callback: Callback) -> Result<SubscriptionId, DataError> {
        self.inner.catalog.endpoint_for(field)?;
        Ok(self.inner.subscriptions.subscribe(field, callback))
    }

    /// Removes one registration.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscriptions.unsubscribe(id)
    }

    // ========================================================================
    // Observability
    // ========================================================================

    /// Last error recorded for `endpoint`, cleared by the next success.
    pub fn last_error(&self, endpoint: EndpointId) -> Option<DataError> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&endpoint)
            .and_then(|r| r.last_error.clone())
    }

    /// Snapshot of budget, session, and per-endpoint state.
    pub fn diagnostics(&self) -> Diagnostics {
        let records = self
            .inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let in_flight: Vec<EndpointId> = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();

        let endpoints: BTreeMap<EndpointId, EndpointStatus> = self
            .inner
            .catalog
            .ids()
            .map(|id| {
                let record = records.get(&id).cloned().unwrap_or_default();
                let cached = self.inner.cache.get(id);
                let status = EndpointStatus {
                    last_fetch: record.last_fetch,
                    last_success: record.last_success,
                    last_status: record.last_status,
                    last_error: record.last_error.map(|e| e.to_string()),
                    calls: record.calls,
                    in_flight: in_flight.contains(&id),
                    fresh: cached.as_ref().is_some_and(|e| self.inner.cache.is_fresh(e)),
                    cached_at: cached.map(|e| e.fetched_at),
                };
                (id, status)
            })
            .collect();

        Diagnostics {
            budget: self.inner.budget.snapshot(),
            token_expires_at: self.inner.tokens.token_expiry(),
            token_valid: self.inner.tokens.has_valid_token(),
            credentials_rejected: self.inner.tokens.credentials_rejected(),
            auth_status: self.inner.tokens.last_status_code(),
            data_status: *self
                .inner
                .data_status
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            endpoints,
        }
    }
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("catalog", &self.inner.catalog)
            .field("cache", &self.inner.cache)
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Fetch Task
// ============================================================================

impl Inner {
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    async fn fetch_and_store(&self, endpoint: EndpointId, ttl: Duration) -> Result<CacheEntry, DataError> {
        match self.call_upstream(endpoint).await {
            Ok(payload) => {
                let stored = self.cache.store(endpoint, payload, ttl);
                self.record(endpoint, |r| {
                    r.last_success = Some(stored.entry.fetched_at);
                    r.last_error = None;
                });
                if stored.changed {
                    self.notify(&stored.entry);
                }
                Ok(stored.entry)
            }
            Err(err) => {
                self.record(endpoint, |r| r.last_error = Some(err.clone()));

                // Auth failures need attention, so they are never masked.
                if matches!(err, DataError::Auth(_)) {
                    warn!(error = %err, "Authentication failed");
                    return Err(err);
                }

                match self.cache.get(endpoint) {
                    Some(stale) => {
                        warn!(error = %err, fetched_at = %stale.fetched_at, "Serving stale data");
                        Ok(stale)
                    }
                    None => {
                        warn!(error = %err, "Fetch failed with nothing cached");
                        Err(err)
                    }
                }
            }
        }
    }

    async fn call_upstream(&self, endpoint: EndpointId) -> Result<Value, DataError> {
        let mut retries = 0;
        let mut reauthenticated = false;
        let mut last_error: Option<DataError> = None;

        loop {
            if !self.budget.try_reserve() {
                return Err(last_error.unwrap_or(DataError::QuotaExhausted(endpoint)));
            }

            let token = self.tokens.ensure_valid_token().await?;

            self.record(endpoint, |r| {
                r.last_fetch = Some(self.clock.now());
                r.calls += 1;
            });

            let err = match self.client.fetch(endpoint, &token).await {
                Ok(payload) => {
                    self.record_status(endpoint, Some(200));
                    return Ok(payload);
                }
                Err(err) => err,
            };
            self.record_status(endpoint, err.status_code());

            if matches!(err, FetchError::Unauthorized) {
                if reauthenticated {
                    warn!("Renewed token rejected by the data API");
                    return Err(AuthError::UnexpectedStatus {
                        step: "data request",
                        status: 401,
                    }
                    .into());
                }
                info!("Token rejected by the data API, renewing");
                reauthenticated = true;
                self.tokens.invalidate(&token);
            } else if self.retry.should_retry(&err, retries + 1) {
                retries += 1;
                let delay = self.retry.delay_for_attempt(retries);
                warn!(attempt = retries, delay_ms = delay.as_millis(), error = %err, "Retrying fetch");
                tokio::time::sleep(delay).await;
            } else {
                return Err(err.into());
            }
            last_error = Some(err.into());
        }
    }

    fn project(&self, field: Field, entry: &CacheEntry, stale: bool) -> Result<FieldValue, DataError> {
        let value = project_field(field, &entry.payload, entry.fetched_at)?;
        Ok(FieldValue {
            field,
            value,
            last_updated: entry.fetched_at,
            source_endpoint: entry.endpoint,
            stale,
        })
    }

    fn notify(&self, entry: &CacheEntry) {
        for (field, callback) in self.subscriptions.for_endpoint(entry.endpoint) {
            match self.project(field, entry, false) {
                Ok(value) => callback(&value),
                Err(err) => warn!(field = %field, error = %err, "Skipping notification"),
            }
        }
    }

    fn record(&self, endpoint: EndpointId, update: impl FnOnce(&mut EndpointRecord)) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        update(records.entry(endpoint).or_default());
    }

    fn record_status(&self, endpoint: EndpointId, status: Option<u16>) {
        self.record(endpoint, |r| r.last_status = status);
        if status.is_some() {
            *self.data_status.lock().unwrap_or_else(PoisonError::into_inner) = status;
        }
    }
}
