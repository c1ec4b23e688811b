//! Scripted transport for tests.
//!
//! Enabled with the `testing` feature. Requests are routed by a key: the
//! GraphQL `operationName` when present, `authorize`/`resume` for the two
//! login form steps, and the URL path otherwise.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::TransportError;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Route key of the login authorization step.
pub const AUTHORIZE: &str = "authorize";
/// Route key of the credential submission step.
pub const RESUME: &str = "resume";
/// Route key of the code exchange.
pub const GET_AUTH_TOKEN: &str = "getAuthToken";
/// Route key of the token refresh.
pub const REFRESH_AUTH_TOKEN: &str = "refreshAuthToken";

type MockResult = Result<HttpResponse, TransportError>;

#[derive(Default)]
struct Route {
    queued: VecDeque<MockResult>,
    sticky: Option<MockResult>,
}

#[derive(Default)]
struct MockState {
    routes: HashMap<String, Route>,
    calls: Vec<(String, HttpRequest)>,
    latency: Duration,
}

/// A [`Transport`] that answers from a script and records every call.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    /// Creates a transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Queues a one-shot response for `key`.
    pub fn push(&self, key: &str, response: HttpResponse) -> &Self {
        self.push_result(key, Ok(response))
    }

    /// Queues a one-shot transport failure for `key`.
    pub fn push_error(&self, key: &str, error: TransportError) -> &Self {
        self.push_result(key, Err(error))
    }

    fn push_result(&self, key: &str, result: MockResult) -> &Self {
        self.with_state(|s| {
            s.routes
                .entry(key.to_string())
                .or_default()
                .queued
                .push_back(result);
        });
        self
    }

    /// Sets the response for `key` once its queue is drained.
    pub fn always(&self, key: &str, response: HttpResponse) -> &Self {
        self.with_state(|s| {
            s.routes.entry(key.to_string()).or_default().sticky = Some(Ok(response));
        });
        self
    }

    /// Sets a failure for `key` once its queue is drained.
    pub fn always_error(&self, key: &str, error: TransportError) -> &Self {
        self.with_state(|s| {
            s.routes.entry(key.to_string()).or_default().sticky = Some(Err(error));
        });
        self
    }

    /// Delays every response.
    pub fn set_latency(&self, latency: Duration) {
        self.with_state(|s| s.latency = latency);
    }

    /// Scripts a successful three-step login ending in `access_token`.
    pub fn script_login(&self, access_token: &str, expires_in: i64) -> &Self {
        self.push(AUTHORIZE, redirect("/as/authorization.oauth2?resumePath=abc123"))
            .push(RESUME, redirect(&format!("{}?code=auth-code", crate::graphql::REDIRECT_URI)))
            .push(
                GET_AUTH_TOKEN,
                token_response(GET_AUTH_TOKEN, access_token, "refresh-1", expires_in),
            )
    }

    /// Total number of calls.
    pub fn total_calls(&self) -> usize {
        self.with_state(|s| s.calls.len())
    }

    /// Number of calls routed to `key`.
    pub fn call_count(&self, key: &str) -> usize {
        self.with_state(|s| s.calls.iter().filter(|(k, _)| k == key).count())
    }

    /// Requests routed to `key`, in order.
    pub fn requests(&self, key: &str) -> Vec<HttpRequest> {
        self.with_state(|s| {
            s.calls
                .iter()
                .filter(|(k, _)| k == key)
                .map(|(_, r)| r.clone())
                .collect()
        })
    }

    /// Route keys of all calls, in order.
    pub fn call_log(&self) -> Vec<String> {
        self.with_state(|s| s.calls.iter().map(|(k, _)| k.clone()).collect())
    }
}

/// Computes the route key for a request.
pub fn route_key(request: &HttpRequest) -> String {
    if let Some(operation) = request.query_param("operationName") {
        return operation;
    }
    let path = request.url.path();
    if path.ends_with("authorization.oauth2") {
        AUTHORIZE.to_string()
    } else if path.ends_with("authorization.ping") {
        RESUME.to_string()
    } else {
        path.to_string()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let key = route_key(&request);
        let (latency, result) = self.with_state(|s| {
            s.calls.push((key.clone(), request));
            let result = s.routes.get_mut(&key).and_then(|route| {
                route.queued.pop_front().or_else(|| route.sticky.clone())
            });
            (s.latency, result)
        });

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        result.unwrap_or_else(|| Err(TransportError::Network(format!("no scripted response for {key}"))))
    }
}

// ============================================================================
// Response Builders
// ============================================================================

/// A 302 redirect to `location`.
pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::new(302, Vec::new()).with_header("Location", location)
}

/// A GraphQL success body `{"data": {key: payload}}`.
pub fn graphql_data(key: &str, payload: Value) -> HttpResponse {
    HttpResponse::new(200, json!({ "data": { key: payload } }).to_string())
}

/// A GraphQL error body.
pub fn graphql_error(message: &str) -> HttpResponse {
    HttpResponse::new(200, json!({ "errors": [{ "message": message }], "data": null }).to_string())
}

/// A token exchange response for `operation`.
pub fn token_response(
    operation: &str,
    access_token: &str,
    refresh_token: &str,
    expires_in: i64,
) -> HttpResponse {
    graphql_data(
        operation,
        json!({
            "id_token": "id",
            "access_token": access_token,
            "refresh_token": refresh_token,
            "expires_in": expires_in,
        }),
    )
}
