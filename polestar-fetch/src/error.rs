//! Fetch error types.
//!
//! [`FetchError`] and [`AuthError`] are `Clone` because one failed upstream
//! call is reported to every caller that was waiting on it.

use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Transport Error
// ============================================================================

/// Failure of the transport capability itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection, TLS, or protocol failure.
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the request timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Maps a reqwest error, keeping timeouts distinguishable.
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for data API calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport failed before a response arrived.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },

    /// The access token was rejected.
    #[error("Not authorized")]
    Unauthorized,

    /// Rate limited by the API.
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after: Option<u64>,
    },

    /// The GraphQL layer reported an error.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// The response did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The account has no vehicle with the configured VIN.
    #[error("Vehicle not found: {0}")]
    VehicleNotFound(String),
}

impl FetchError {
    /// Returns true for failures worth retrying after a short backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status to record for diagnostics.
    ///
    /// GraphQL errors arrive with HTTP 200 but are recorded as 500.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport(_) => None,
            Self::Http { status, .. } => Some(*status),
            Self::Unauthorized => Some(401),
            Self::RateLimited { .. } => Some(429),
            Self::GraphQl(_) | Self::InvalidResponse(_) | Self::VehicleNotFound(_) => Some(500),
        }
    }
}

// ============================================================================
// Auth Error
// ============================================================================

/// Error type for login and token refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The account rejected the email/password or application key.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The identity provider is throttling logins.
    #[error("Login rate limited, retry after {retry_after:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after: Option<u64>,
    },

    /// Transport failed during an auth exchange.
    #[error("Network error during authentication: {0}")]
    Transport(#[from] TransportError),

    /// An auth step returned an unexpected status.
    #[error("Unexpected HTTP {status} during {step}")]
    UnexpectedStatus {
        /// Which step of the exchange failed.
        step: &'static str,
        /// Status code.
        status: u16,
    },

    /// An auth step returned an unusable body or redirect.
    #[error("Invalid auth response: {0}")]
    InvalidResponse(String),

    /// The refresh token was rejected or is missing.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
}

impl AuthError {
    /// Returns true if retrying cannot help without new configuration.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Transport(TransportError::Timeout(Duration::from_secs(30))).is_transient());
        assert!(FetchError::Http { status: 503, message: String::new() }.is_transient());
        assert!(!FetchError::Http { status: 404, message: String::new() }.is_transient());
        assert!(!FetchError::Unauthorized.is_transient());
        assert!(!FetchError::GraphQl("boom".into()).is_transient());
    }

    #[test]
    fn test_status_codes_for_diagnostics() {
        assert_eq!(FetchError::Unauthorized.status_code(), Some(401));
        assert_eq!(FetchError::GraphQl("x".into()).status_code(), Some(500));
        assert_eq!(
            FetchError::Transport(TransportError::Network("reset".into())).status_code(),
            None
        );
    }

    #[test]
    fn test_only_invalid_credentials_is_fatal() {
        assert!(AuthError::InvalidCredentials.is_fatal());
        assert!(!AuthError::RateLimited { retry_after: None }.is_fatal());
        assert!(!AuthError::RefreshFailed("expired".into()).is_fatal());
    }
}
