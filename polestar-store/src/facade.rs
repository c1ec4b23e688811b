//! Consumer-facing entry point.

use std::sync::Arc;
use std::time::Duration;

use polestar_core::{
    Credentials, EndpointCatalog, Field, FieldValue, SharedClock, SystemClock,
};
use polestar_fetch::budget::DEFAULT_DAILY_LIMIT;
use polestar_fetch::transport::DEFAULT_TIMEOUT;
use polestar_fetch::{
    ApiClient, AuthConfig, HttpTransport, RequestBudget, RetryStrategy, TokenStore, Transport,
};
use tracing::info;

use crate::coordinator::{FetchCoordinator, RefreshReport};
use crate::diagnostics::Diagnostics;
use crate::error::{DataError, StoreError};
use crate::settings::Settings;
use crate::subscriptions::SubscriptionId;

// ============================================================================
// Facade
// ============================================================================

/// Reads, subscriptions, and scheduled refreshes for one vehicle.
///
/// Clones share the same cache, budget, and session.
///
/// ```ignore
/// let facade = VehicleDataFacade::builder(credentials).build()?;
/// let level = facade.get(Field::BatteryLevel).await?;
/// println!("{}", level.display_value());
/// ```
#[derive(Debug, Clone)]
pub struct VehicleDataFacade {
    coordinator: FetchCoordinator,
    vehicle_identifier: String,
}

impl VehicleDataFacade {
    /// Starts building a facade for `credentials`.
    pub fn builder(credentials: Credentials) -> FacadeBuilder {
        FacadeBuilder::new(credentials)
    }

    /// Reads the current value of `field`.
    ///
    /// Served from cache while fresh. A value from an expired entry is
    /// returned with `stale` set when a fetch was not possible.
    pub async fn get(&self, field: Field) -> Result<FieldValue, DataError> {
        self.coordinator.get_field(field).await
    }

    /// Reads a field by its snake_case name.
    pub async fn get_by_name(&self, name: &str) -> Result<FieldValue, DataError> {
        let (field, _) = self.coordinator.catalog().resolve(name)?;
        self.get(field).await
    }

    /// Calls `callback` whenever `field`'s endpoint is refreshed with a
    /// changed payload.
    pub fn subscribe<F>(&self, field: Field, callback: F) -> Result<SubscriptionId, DataError>
    where
        F: Fn(&FieldValue) + Send + Sync + 'static,
    {
        self.coordinator.subscribe(field, Arc::new(callback))
    }

    /// Removes exactly the registration `id`.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.coordinator.unsubscribe(id)
    }

    /// Refreshes every endpoint that is not fresh.
    pub async fn refresh_all(&self) -> RefreshReport {
        self.coordinator.refresh_all().await
    }

    /// Last error seen for `field`'s endpoint.
    pub fn last_error(&self, field: Field) -> Option<DataError> {
        self.coordinator.last_error(field.endpoint())
    }

    /// Calls left in the current budget window.
    pub fn remaining_budget(&self) -> u32 {
        self.coordinator.budget().remaining()
    }

    /// Snapshot for diagnostics display.
    pub fn diagnostics(&self) -> Diagnostics {
        self.coordinator.diagnostics()
    }

    /// The endpoints and fields this facade serves.
    pub fn catalog(&self) -> &EndpointCatalog {
        self.coordinator.catalog()
    }

    /// VIN of the vehicle.
    pub fn vehicle_identifier(&self) -> &str {
        &self.vehicle_identifier
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`VehicleDataFacade`].
pub struct FacadeBuilder {
    credentials: Credentials,
    transport: Option<Arc<dyn Transport>>,
    clock: SharedClock,
    catalog: EndpointCatalog,
    request_limit: u32,
    budget_period: chrono::Duration,
    retry: RetryStrategy,
    auth: AuthConfig,
    timeout: Duration,
}

impl FacadeBuilder {
    fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            transport: None,
            clock: Arc::new(SystemClock),
            catalog: EndpointCatalog::default(),
            request_limit: DEFAULT_DAILY_LIMIT,
            budget_period: chrono::Duration::hours(24),
            retry: RetryStrategy::default(),
            auth: AuthConfig::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Applies the tunables from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if a base URL in `settings` is invalid.
    pub fn settings(self, settings: &Settings) -> Result<Self, StoreError> {
        Ok(Self {
            catalog: settings.catalog(),
            request_limit: settings.daily_request_limit,
            budget_period: settings.budget_period(),
            retry: settings.retry_strategy(),
            auth: settings.auth_config()?,
            timeout: settings.request_timeout(),
            ..self
        })
    }

    /// Uses `transport` instead of a new [`HttpTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses `clock` instead of the system clock.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Restricts or retunes the served endpoints.
    pub fn catalog(mut self, catalog: EndpointCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Sets the request budget.
    pub fn budget(mut self, limit: u32, period: chrono::Duration) -> Self {
        self.request_limit = limit;
        self.budget_period = period;
        self
    }

    /// Sets the retry policy for data calls.
    pub fn retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the auth exchange settings.
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the data call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the facade.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transport`] if no transport was given and the
    /// HTTP client cannot be created.
    pub fn build(self) -> Result<VehicleDataFacade, StoreError> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };

        let vehicle_identifier = self.credentials.vehicle_identifier.clone();
        let client = ApiClient::new(
            Arc::clone(&transport),
            self.auth.urls.clone(),
            vehicle_identifier.clone(),
        )
        .with_timeout(self.timeout);
        let tokens = Arc::new(TokenStore::new(
            self.credentials,
            transport,
            Arc::clone(&self.clock),
            self.auth,
        ));
        let budget = Arc::new(RequestBudget::new(
            self.request_limit,
            self.budget_period,
            Arc::clone(&self.clock),
        ));

        info!(
            endpoints = self.catalog.endpoints().len(),
            limit = self.request_limit,
            "Vehicle data facade ready"
        );

        Ok(VehicleDataFacade {
            coordinator: FetchCoordinator::new(
                self.catalog,
                budget,
                tokens,
                client,
                self.retry,
                self.clock,
            ),
            vehicle_identifier,
        })
    }
}

impl std::fmt::Debug for FacadeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacadeBuilder")
            .field("credentials", &self.credentials)
            .field("request_limit", &self.request_limit)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
