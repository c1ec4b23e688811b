//! Diagnostics snapshot for display by a host.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use polestar_core::EndpointId;
use polestar_fetch::BudgetSnapshot;
use serde::Serialize;

/// Observed state of one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointStatus {
    /// When an upstream call was last attempted.
    pub last_fetch: Option<DateTime<Utc>>,
    /// When an upstream call last succeeded.
    pub last_success: Option<DateTime<Utc>>,
    /// HTTP status of the last attempt, if one was received.
    pub last_status: Option<u16>,
    /// Last error, cleared on success.
    pub last_error: Option<String>,
    /// Number of upstream calls made.
    pub calls: u64,
    /// Whether a fetch is currently outstanding.
    pub in_flight: bool,
    /// Whether the cached payload is fresh.
    pub fresh: bool,
    /// When the cached payload was fetched.
    pub cached_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of budget, session, and endpoint health.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    /// Request budget state.
    pub budget: BudgetSnapshot,
    /// Expiry of the current session token.
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Whether the current token is usable now.
    pub token_valid: bool,
    /// Whether the identity provider rejected the credentials.
    pub credentials_rejected: bool,
    /// Last HTTP status seen from the identity provider.
    pub auth_status: Option<u16>,
    /// Last HTTP status seen from the data API.
    pub data_status: Option<u16>,
    /// Per-endpoint state.
    pub endpoints: BTreeMap<EndpointId, EndpointStatus>,
}

impl Diagnostics {
    /// True when the last auth and data calls returned 200 and the token is
    /// valid.
    pub fn api_connected(&self) -> bool {
        self.token_valid && self.auth_status == Some(200) && self.data_status == Some(200)
    }

    /// Most recent successful fetch across all endpoints.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.endpoints.values().filter_map(|s| s.last_success).max()
    }
}
