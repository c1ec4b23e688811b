//! Account credentials and session tokens.
//!
//! Both types carry secret material, so their `Debug` output is redacted.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const REDACTED: &str = "<redacted>";

// ============================================================================
// Credentials
// ============================================================================

/// Everything needed to log in and address one vehicle.
///
/// Loaded once at startup. Changing any field requires a fresh token store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account email address.
    pub email: String,
    /// Account password.
    #[serde(skip_serializing, default)]
    pub password: String,
    /// Provisioned application key, sent as the OAuth client identifier.
    pub application_key: String,
    /// VIN of the vehicle to expose.
    pub vehicle_identifier: String,
}

impl Credentials {
    /// Creates a new credentials set.
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        application_key: impl Into<String>,
        vehicle_identifier: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            application_key: application_key.into(),
            vehicle_identifier: vehicle_identifier.into(),
        }
    }

    /// Last four characters of the VIN, used for display names.
    pub fn short_vehicle_id(&self) -> &str {
        let vin = self.vehicle_identifier.as_str();
        let start = vin
            .char_indices()
            .rev()
            .nth(3)
            .map_or(0, |(idx, _)| idx);
        &vin[start..]
    }

    /// Returns true when the vehicle identifier matches `vin`, ignoring case.
    pub fn matches_vehicle(&self, vin: &str) -> bool {
        self.vehicle_identifier.eq_ignore_ascii_case(vin)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &REDACTED)
            .field("application_key", &REDACTED)
            .field("vehicle_identifier", &self.vehicle_identifier)
            .finish()
    }
}

// ============================================================================
// Token
// ============================================================================

/// A short-lived access token plus the refresh token that renews it.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    /// Bearer token presented to the data API.
    pub access_token: String,
    /// Token used to obtain a new access token without logging in.
    pub refresh_token: Option<String>,
    /// Instant after which the access token must not be used.
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Creates a token that expires `expires_in` after `issued_at`.
    pub fn issued(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        issued_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: issued_at + expires_in,
        }
    }

    /// Returns true if the token is still valid `grace` past `now`.
    pub fn is_valid_for(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        now + grace < self.expires_at
    }

    /// Returns true if the token has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Formats the `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &REDACTED)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| REDACTED))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
