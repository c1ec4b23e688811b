// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Polestar Bridge Core
//!
//! Core types, models, and traits shared by the Polestar Bridge crates.
//!
//! This crate has no I/O. It describes what can be read from the vehicle
//! and how raw API payloads turn into typed values:
//!
//! - Domain models (credentials, tokens, endpoints, fields, values)
//! - Payload projection
//! - Error types
//! - The [`Clock`] abstraction used for all time-dependent decisions
//!
//! ## Key Types
//!
//! ### Account
//! - [`Credentials`] - Login data and the vehicle to address
//! - [`Token`] - Access/refresh token pair with expiry
//!
//! ### Catalog
//! - [`EndpointId`] - Upstream resource identifier
//! - [`Endpoint`] - Resource description with produced fields and TTL
//! - [`EndpointCatalog`] - Field to endpoint resolution
//! - [`Field`] - Enumerated telemetry field
//!
//! ### Values
//! - [`TelemetryValue`] - A typed reading
//! - [`FieldValue`] - A reading with provenance and staleness

pub mod error;
pub mod models;
pub mod traits;

pub use error::CoreError;

pub use models::{
    // Account
    Credentials,
    Token,
    // Catalog
    Endpoint,
    EndpointCatalog,
    EndpointId,
    Field,
    FieldSource,
    ValueKind,
    // Values
    ChargerConnectionStatus,
    ChargingStatus,
    FieldValue,
    TelemetryValue,
    // Projection
    lookup,
    project_field,
};

pub use traits::{Clock, ManualClock, SharedClock, SystemClock};
