// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Polestar Bridge Fetch
//!
//! Network plumbing for the Polestar Bridge: everything that sends a request.
//!
//! ## Transport
//!
//! - [`transport::Transport`] - The `send(request) -> response` capability
//! - [`transport::HttpTransport`] - reqwest implementation, redirects disabled
//!
//! ## Session and Quota
//!
//! - [`auth::TokenStore`] - Login, refresh, and token validity
//! - [`budget::RequestBudget`] - Daily call allowance for the data API
//! - [`retry::RetryStrategy`] - Bounded backoff for transient failures
//!
//! ## Data API
//!
//! - [`client::ApiClient`] - One GraphQL call per endpoint
//! - [`graphql`] - Request building and response parsing
//!
//! ## Testing
//!
//! With the `testing` feature, [`testing::MockTransport`] answers from a
//! script and records every call.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use polestar_core::{Credentials, SystemClock};
//! use polestar_fetch::{ApiClient, ApiUrls, AuthConfig, HttpTransport, TokenStore};
//!
//! let transport = Arc::new(HttpTransport::new()?);
//! let tokens = TokenStore::new(credentials, transport.clone(), Arc::new(SystemClock), AuthConfig::default());
//! let client = ApiClient::new(transport, ApiUrls::default(), "YSMYKEAE1RB000123");
//!
//! let token = tokens.ensure_valid_token().await?;
//! let battery = client.fetch(EndpointId::Battery, &token).await?;
//! ```

pub mod auth;
pub mod budget;
pub mod client;
pub mod error;
pub mod graphql;
pub mod retry;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Errors
pub use error::{AuthError, FetchError, TransportError};

// Transport
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};

// Session and quota
pub use auth::{AuthConfig, TokenStore};
pub use budget::{BudgetSnapshot, RequestBudget};
pub use retry::{MAX_RETRIES, RetryStrategy};

// Data API
pub use client::ApiClient;
pub use graphql::ApiUrls;
