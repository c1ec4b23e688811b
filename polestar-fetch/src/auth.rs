//! Session token ownership: login, refresh, and validity checks.
//!
//! [`TokenStore`] is the only writer of the session [`Token`]. Refresh and
//! login are serialised by an async lock so concurrent callers that find the
//! token expiring trigger exactly one exchange; readers take a snapshot from
//! a synchronous lock and never wait on the network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use polestar_core::{Credentials, SharedClock, Token};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::AuthError;
use crate::graphql::{self, ApiUrls, AuthTokenPayload, REDIRECT_URI};
use crate::transport::{DEFAULT_TIMEOUT, HttpRequest, HttpResponse, Transport};

/// Default margin, in seconds, a token must remain valid for when handed out.
pub const DEFAULT_GRACE_SECS: i64 = 30;

// ============================================================================
// Auth Config
// ============================================================================

/// Settings for the auth exchanges.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Identity provider and API base URLs.
    pub urls: ApiUrls,
    /// Timeout for each auth request.
    pub timeout: Duration,
    /// Tokens expiring within this margin are renewed before use.
    pub grace: chrono::Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            urls: ApiUrls::default(),
            timeout: DEFAULT_TIMEOUT,
            grace: chrono::Duration::seconds(DEFAULT_GRACE_SECS),
        }
    }
}

// ============================================================================
// Token Store
// ============================================================================

/// Owns the credentials and the current session token.
pub struct TokenStore {
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    clock: SharedClock,
    config: AuthConfig,
    token: RwLock<Option<Token>>,
    exchange: tokio::sync::Mutex<()>,
    rejected: AtomicBool,
    last_status: Mutex<Option<u16>>,
}

impl TokenStore {
    /// Creates a store with no token. The first call logs in.
    pub fn new(
        credentials: Credentials,
        transport: Arc<dyn Transport>,
        clock: SharedClock,
        config: AuthConfig,
    ) -> Self {
        Self {
            credentials,
            transport,
            clock,
            config,
            token: RwLock::new(None),
            exchange: tokio::sync::Mutex::new(()),
            rejected: AtomicBool::new(false),
            last_status: Mutex::new(None),
        }
    }

    /// The credentials this store logs in with.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns a token valid for at least the grace period.
    ///
    /// Renews a token inside its grace window by refresh, falling back to
    /// one full login if the refresh fails. An already expired token goes
    /// straight to login. After the account rejects the credentials every
    /// call fails with [`AuthError::InvalidCredentials`] without network I/O.
    pub async fn ensure_valid_token(&self) -> Result<Token, AuthError> {
        self.check_rejected()?;
        if let Some(token) = self.usable_token() {
            return Ok(token);
        }

        let _exchange = self.exchange.lock().await;

        // Another caller may have renewed while we waited.
        self.check_rejected()?;
        if let Some(token) = self.usable_token() {
            return Ok(token);
        }

        // An expired access token is never sent; past expiry only a login helps.
        let now = self.clock.now();
        if self
            .current_token()
            .is_some_and(|t| t.refresh_token.is_some() && !t.is_expired(now))
        {
            match self.refresh_locked().await {
                Ok(token) => return Ok(token),
                Err(err) => warn!(error = %err, "Token refresh failed, logging in again"),
            }
        }

        self.login_locked().await
    }

    /// Performs a full login, replacing any stored token.
    pub async fn login(&self) -> Result<Token, AuthError> {
        self.check_rejected()?;
        let _exchange = self.exchange.lock().await;
        self.login_locked().await
    }

    /// Renews the stored token with its refresh token.
    pub async fn refresh(&self) -> Result<Token, AuthError> {
        self.check_rejected()?;
        let _exchange = self.exchange.lock().await;
        self.refresh_locked().await
    }

    /// Marks `rejected` as expired if it is still the stored token.
    ///
    /// The next [`ensure_valid_token`] then logs in again. A token that was
    /// already replaced by a concurrent renewal is left alone.
    ///
    /// [`ensure_valid_token`]: Self::ensure_valid_token
    pub fn invalidate(&self, rejected: &Token) {
        let now = self.clock.now();
        let mut token = self.token.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = token.as_mut() {
            if current.access_token == rejected.access_token {
                debug!("Access token rejected, marking expired");
                current.expires_at = current.expires_at.min(now);
            }
        }
    }

    /// Snapshot of the stored token.
    pub fn current_token(&self) -> Option<Token> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Expiry of the stored token.
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.current_token().map(|t| t.expires_at)
    }

    /// Whether the stored token is usable right now.
    pub fn has_valid_token(&self) -> bool {
        self.usable_token().is_some()
    }

    /// HTTP status of the most recent auth call.
    pub fn last_status_code(&self) -> Option<u16> {
        *self.last_status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the account rejected the credentials.
    pub fn credentials_rejected(&self) -> bool {
        self.rejected.load(Ordering::Acquire)
    }

    fn check_rejected(&self) -> Result<(), AuthError> {
        if self.credentials_rejected() {
            Err(AuthError::InvalidCredentials)
        } else {
            Ok(())
        }
    }

    fn usable_token(&self) -> Option<Token> {
        let now = self.clock.now();
        self.current_token()
            .filter(|t| t.is_valid_for(now, self.config.grace))
    }

    fn store(&self, payload: AuthTokenPayload, previous_refresh: Option<String>) -> Token {
        let token = Token::issued(
            payload.access_token,
            payload.refresh_token.or(previous_refresh),
            self.clock.now(),
            chrono::Duration::seconds(payload.expires_in),
        );
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        token
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthError> {
        let response = self.transport.send(request).await?;
        *self.last_status.lock().unwrap_or_else(PoisonError::into_inner) = Some(response.status);
        Ok(response)
    }

    // ========================================================================
    // Exchanges (caller holds `exchange`)
    // ========================================================================

    #[instrument(skip(self))]
    async fn refresh_locked(&self) -> Result<Token, AuthError> {
        let current = self
            .current_token()
            .ok_or_else(|| AuthError::RefreshFailed("no token to refresh".to_string()))?;
        let refresh_token = current
            .refresh_token
            .clone()
            .ok_or_else(|| AuthError::RefreshFailed("no refresh token".to_string()))?;
        if current.is_expired(self.clock.now()) {
            return Err(AuthError::RefreshFailed("access token expired".to_string()));
        }

        let request = graphql::refresh_token_request(
            &self.config.urls,
            &refresh_token,
            &current.bearer(),
            self.config.timeout,
        )?;
        let response = self.send(request).await?;
        let payload = graphql::parse_token_response("refreshAuthToken", &response)
            .map_err(|e| match e {
                AuthError::RateLimited { .. } | AuthError::Transport(_) => e,
                other => AuthError::RefreshFailed(other.to_string()),
            })?;

        let token = self.store(payload, Some(refresh_token));
        info!(expires_at = %token.expires_at, "Token refreshed");
        Ok(token)
    }

    #[instrument(skip(self))]
    async fn login_locked(&self) -> Result<Token, AuthError> {
        let result = self.login_flow().await;
        match &result {
            Ok(token) => info!(expires_at = %token.expires_at, "Logged in"),
            Err(AuthError::InvalidCredentials) => {
                warn!("Credentials rejected, further logins disabled");
                self.rejected.store(true, Ordering::Release);
            }
            Err(err) => warn!(error = %err, "Login failed"),
        }
        result
    }

    async fn login_flow(&self) -> Result<Token, AuthError> {
        let code = match self.authorize().await? {
            Authorization::Code(code) => code,
            Authorization::Resume(path) => self.submit_credentials(&path).await?,
        };

        let request = graphql::get_token_request(&self.config.urls, &code, self.config.timeout)?;
        let response = self.send(request).await?;
        let payload = graphql::parse_token_response("getAuthToken", &response)?;
        Ok(self.store(payload, None))
    }

    async fn authorize(&self) -> Result<Authorization, AuthError> {
        let url = self
            .config
            .urls
            .authorization_url()
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        let request = HttpRequest::get(url)
            .query(&[
                ("response_type", "code"),
                ("client_id", self.credentials.application_key.as_str()),
                ("redirect_uri", REDIRECT_URI),
            ])
            .timeout(self.config.timeout);

        let response = self.send(request).await?;
        if response.is_rate_limited() {
            return Err(AuthError::RateLimited {
                retry_after: response.retry_after_secs(),
            });
        }
        if !matches!(response.status, 302 | 303) {
            return Err(AuthError::UnexpectedStatus {
                step: "authorize",
                status: response.status,
            });
        }

        let location = self.redirect_target(&response)?;
        if let Some(code) = query_value(&location, "code") {
            debug!("Existing identity session, skipping credential submission");
            return Ok(Authorization::Code(code));
        }
        query_value(&location, "resumePath")
            .map(Authorization::Resume)
            .ok_or_else(|| AuthError::InvalidResponse("authorize redirect lacks resumePath".into()))
    }

    async fn submit_credentials(&self, resume_path: &str) -> Result<String, AuthError> {
        let url = self
            .config
            .urls
            .resume_url(resume_path)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        let request = HttpRequest::post(url)
            .query(&[("client_id", self.credentials.application_key.as_str())])
            .form(&[
                ("pf.username", self.credentials.email.as_str()),
                ("pf.pass", self.credentials.password.as_str()),
            ])
            .timeout(self.config.timeout);

        let response = self.send(request).await?;
        match response.status {
            302 | 303 => {}
            // The login form is rendered again on bad credentials.
            200 | 401 | 403 => return Err(AuthError::InvalidCredentials),
            429 => {
                return Err(AuthError::RateLimited {
                    retry_after: response.retry_after_secs(),
                });
            }
            status => {
                return Err(AuthError::UnexpectedStatus {
                    step: "submit credentials",
                    status,
                });
            }
        }

        let location = self.redirect_target(&response)?;
        if let Some(code) = query_value(&location, "code") {
            return Ok(code);
        }
        if query_value(&location, "error").is_some() {
            return Err(AuthError::InvalidCredentials);
        }
        Err(AuthError::InvalidResponse(
            "credential redirect lacks code".to_string(),
        ))
    }

    fn redirect_target(&self, response: &HttpResponse) -> Result<Url, AuthError> {
        let location = response
            .header("location")
            .ok_or_else(|| AuthError::InvalidResponse("redirect without Location".to_string()))?;
        let base = self
            .config
            .urls
            .oidc_base()
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        base.join(location)
            .map_err(|e| AuthError::InvalidResponse(format!("bad Location: {e}")))
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("credentials", &self.credentials)
            .field("token", &self.current_token())
            .field("rejected", &self.credentials_rejected())
            .finish_non_exhaustive()
    }
}

enum Authorization {
    Code(String),
    Resume(String),
}

fn query_value(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}
