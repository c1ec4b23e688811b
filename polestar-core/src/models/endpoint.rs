//! Upstream endpoints and the catalog that maps fields onto them.
//!
//! - [`EndpointId`] - Identifier of an upstream resource
//! - [`Endpoint`] - Static description: operation, produced fields, TTL
//! - [`EndpointCatalog`] - The set of endpoints a client polls

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::field::Field;
use crate::error::CoreError;

// ============================================================================
// Endpoint Id
// ============================================================================

/// Identifier of an upstream API resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointId {
    /// Static vehicle information (model, registration, software).
    VehicleInformation,
    /// Odometer and trip meters.
    Odometer,
    /// Battery and charging state.
    Battery,
    /// Last known position.
    Location,
    /// Cabin climate.
    Climate,
}

impl EndpointId {
    /// Returns all endpoint identifiers.
    pub fn all() -> &'static [EndpointId] {
        &[
            Self::VehicleInformation,
            Self::Odometer,
            Self::Battery,
            Self::Location,
            Self::Climate,
        ]
    }

    /// Returns the snake_case name used in config and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VehicleInformation => "vehicle_information",
            Self::Odometer => "odometer",
            Self::Battery => "battery",
            Self::Location => "location",
            Self::Climate => "climate",
        }
    }

    /// GraphQL operation name for this endpoint.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::VehicleInformation => "GetConsumerCarsV2",
            Self::Odometer => "GetOdometerData",
            Self::Battery => "GetBatteryData",
            Self::Location => "GetLastKnownLocation",
            Self::Climate => "GetClimateData",
        }
    }

    /// Default freshness window.
    ///
    /// Vehicle information barely changes; telemetry is kept short so a
    /// one-minute poll always sees a stale entry and refetches.
    pub fn default_ttl(&self) -> Duration {
        match self {
            Self::VehicleInformation => Duration::minutes(15),
            Self::Odometer | Self::Battery | Self::Location => Duration::seconds(30),
            Self::Climate => Duration::seconds(60),
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| CoreError::UnknownEndpoint(s.to_string()))
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Static description of one upstream resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Identifier.
    pub id: EndpointId,
    /// Fields projected from this endpoint's payload.
    pub produces: Vec<Field>,
    /// How long a fetched payload stays fresh.
    pub ttl: Duration,
}

impl Endpoint {
    /// Creates an endpoint with its default TTL and field set.
    pub fn new(id: EndpointId) -> Self {
        Self {
            id,
            produces: Field::all()
                .iter()
                .copied()
                .filter(|f| f.endpoint() == id)
                .collect(),
            ttl: id.default_ttl(),
        }
    }

    /// Overrides the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns true if this endpoint produces `field`.
    pub fn produces(&self, field: Field) -> bool {
        self.produces.contains(&field)
    }
}

// ============================================================================
// Endpoint Catalog
// ============================================================================

/// The set of endpoints a client knows about.
///
/// A catalog can be built with a subset of endpoints; fields of an omitted
/// endpoint then resolve to [`CoreError::UnknownField`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCatalog {
    endpoints: Vec<Endpoint>,
}

impl EndpointCatalog {
    /// Creates a catalog from explicit endpoint descriptions.
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        let mut endpoints = endpoints;
        endpoints.sort_by_key(|e| e.id);
        endpoints.dedup_by_key(|e| e.id);
        Self { endpoints }
    }

    /// Creates a catalog restricted to the given endpoints with default TTLs.
    pub fn only(ids: &[EndpointId]) -> Self {
        Self::new(ids.iter().copied().map(Endpoint::new).collect())
    }

    /// Overrides the TTL of one endpoint. Unknown ids are ignored.
    pub fn with_ttl(mut self, id: EndpointId, ttl: Duration) -> Self {
        if let Some(endpoint) = self.endpoints.iter_mut().find(|e| e.id == id) {
            endpoint.ttl = ttl;
        }
        self
    }

    /// Returns all endpoints, ordered by identifier.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Returns the identifiers of all endpoints.
    pub fn ids(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.endpoints.iter().map(|e| e.id)
    }

    /// Looks up an endpoint by identifier.
    pub fn get(&self, id: EndpointId) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    /// Resolves the endpoint that owns `field`.
    pub fn endpoint_for(&self, field: Field) -> Result<&Endpoint, CoreError> {
        self.endpoints
            .iter()
            .find(|e| e.produces(field))
            .ok_or_else(|| CoreError::UnknownField(field.name().to_string()))
    }

    /// Resolves a field by name, then its owning endpoint.
    pub fn resolve(&self, name: &str) -> Result<(Field, &Endpoint), CoreError> {
        let field: Field = name.parse()?;
        let endpoint = self.endpoint_for(field)?;
        Ok((field, endpoint))
    }

    /// Returns every field served by this catalog.
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.endpoints.iter().flat_map(|e| e.produces.iter().copied())
    }
}

impl Default for EndpointCatalog {
    fn default() -> Self {
        Self::only(EndpointId::all())
    }
}
