//! Core error types for Polestar Bridge.

use thiserror::Error;

/// Core error type for domain operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested field name is not part of the catalog.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// The requested endpoint identifier is not part of the catalog.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A payload value could not be converted to the field's type.
    #[error("Invalid data at '{path}': {message}")]
    InvalidData {
        /// Slash-separated path inside the payload.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates an invalid data error for the given payload path.
    pub fn invalid_data(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidData {
            path: path.into(),
            message: message.into(),
        }
    }
}
