//! Data API client: one authenticated GraphQL call per endpoint.
//!
//! Retries, budget reservation, and token renewal belong to the caller; this
//! client performs exactly one transport call per [`ApiClient::fetch`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use polestar_core::{EndpointId, Token};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::graphql::{self, ApiUrls};
use crate::transport::{DEFAULT_TIMEOUT, Transport};

/// Client for the vehicle data endpoints.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    urls: ApiUrls,
    vin: String,
    timeout: Duration,
}

impl ApiClient {
    /// Creates a client for the vehicle `vin`.
    pub fn new(transport: Arc<dyn Transport>, urls: ApiUrls, vin: impl Into<String>) -> Self {
        Self {
            transport,
            urls,
            vin: vin.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// VIN of the addressed vehicle.
    pub fn vin(&self) -> &str {
        &self.vin
    }

    /// Fetches the raw payload of `endpoint`.
    #[instrument(skip(self, token), fields(endpoint = %endpoint))]
    pub async fn fetch(&self, endpoint: EndpointId, token: &Token) -> Result<Value, FetchError> {
        let request =
            graphql::data_request(&self.urls, endpoint, &self.vin, &token.bearer(), self.timeout)?;

        let started = Instant::now();
        let response = self.transport.send(request).await?;
        debug!(
            status = response.status,
            elapsed_ms = started.elapsed().as_millis(),
            "Data call completed"
        );

        graphql::parse_data_response(endpoint, &response, &self.vin)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("urls", &self.urls)
            .field("vin", &self.vin)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
