//! Store error types.

use polestar_core::{CoreError, EndpointId};
use polestar_fetch::{AuthError, FetchError, TransportError};
use thiserror::Error;

// ============================================================================
// Data Error
// ============================================================================

/// Why a field could not be read.
///
/// `Clone` because one upstream failure is delivered to every coalesced
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// The field is not served by this client's catalog.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// No budget left and nothing cached to fall back on.
    #[error("Request budget exhausted and no cached data for {0}")]
    QuotaExhausted(EndpointId),

    /// Could not obtain a valid session token.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The data call failed and nothing cached to fall back on.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The payload could not be projected into the field's type.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The background fetch task panicked or was cancelled.
    #[error("Fetch task failed: {0}")]
    TaskFailed(String),
}

impl DataError {
    /// Returns true if the error needs user action rather than time.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::UnknownField(_) => true,
            Self::Auth(err) => err.is_fatal(),
            _ => false,
        }
    }
}

impl From<CoreError> for DataError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownField(name) => Self::UnknownField(name),
            other => Self::InvalidData(other.to_string()),
        }
    }
}

// ============================================================================
// Store Error
// ============================================================================

/// Errors from settings, persistence, and keychain access.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No password in the environment, keychain, or settings file.
    #[error("No password configured for {0}")]
    MissingPassword(String),

    /// Keychain access failed.
    #[error("Keychain error: {0}")]
    Keychain(String),

    /// The HTTP transport could not be created.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Keychain(_))
    }
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        StoreError::Config(err.to_string())
    }
}
