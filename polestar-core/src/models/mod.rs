//! Domain models for Polestar Bridge.
//!
//! ## Submodules
//!
//! - [`credentials`] - Account credentials and session tokens
//! - [`endpoint`] - Upstream endpoints and the endpoint catalog
//! - [`field`] - The telemetry field set and per-field metadata
//! - [`value`] - Typed values handed to consumers
//! - [`projection`] - Payload to value projection

pub mod credentials;
pub mod endpoint;
pub mod field;
pub mod projection;
pub mod value;

pub use credentials::{Credentials, Token};
pub use endpoint::{Endpoint, EndpointCatalog, EndpointId};
pub use field::{Field, FieldSource, ValueKind};
pub use projection::{lookup, project_field};
pub use value::{ChargerConnectionStatus, ChargingStatus, FieldValue, TelemetryValue};

#[cfg(test)]
mod serde_tests;
