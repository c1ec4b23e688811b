//! Account and polling settings.
//!
//! Persisted as JSON at [`default_settings_path`]. Every field has a default
//! so older files keep loading as settings are added.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use polestar_core::{Credentials, EndpointCatalog, EndpointId};
use polestar_fetch::auth::DEFAULT_GRACE_SECS;
use polestar_fetch::budget::DEFAULT_DAILY_LIMIT;
use polestar_fetch::{ApiUrls, AuthConfig, MAX_RETRIES, RetryStrategy};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::keychain;
use crate::persistence::{default_settings_path, load_json, save_json};

/// Environment variable consulted first for the account password.
pub const PASSWORD_ENV: &str = "POLESTAR_PASSWORD";

const DEFAULT_OIDC_BASE: &str = "https://polestarid.eu.polestar.com/";
const DEFAULT_API_BASE: &str = "https://pc-api.polestar.com/eu-north-1/";

// ============================================================================
// Settings Types
// ============================================================================

/// Retry policy for data calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts after the first.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Double the delay on each retry.
    pub exponential_backoff: bool,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            exponential_backoff: true,
            max_delay_ms: 5_000,
        }
    }
}

/// User settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Account email.
    pub email: String,
    /// VIN of the vehicle to expose.
    pub vehicle_identifier: String,
    /// Provisioned application key.
    pub application_key: String,
    /// Password stored in the file. Prefer the keychain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Data calls allowed per budget window.
    pub daily_request_limit: u32,
    /// Length of the budget window.
    pub budget_period_secs: u64,
    /// Per-endpoint freshness overrides.
    pub ttl_overrides: BTreeMap<EndpointId, u64>,

    /// Timeout for each HTTP request.
    pub request_timeout_secs: u64,
    /// Retry policy for data calls.
    pub retry: RetrySettings,
    /// Tokens expiring within this margin are renewed first.
    pub token_grace_secs: u64,
    /// How often `watch` refreshes.
    pub scan_interval_secs: u64,

    /// Identity provider base URL.
    pub oidc_base_url: String,
    /// Data API base URL.
    pub api_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            email: String::new(),
            vehicle_identifier: String::new(),
            application_key: String::new(),
            password: None,
            daily_request_limit: DEFAULT_DAILY_LIMIT,
            budget_period_secs: 24 * 60 * 60,
            ttl_overrides: BTreeMap::new(),
            request_timeout_secs: 30,
            retry: RetrySettings::default(),
            token_grace_secs: DEFAULT_GRACE_SECS.unsigned_abs(),
            scan_interval_secs: 60,
            oidc_base_url: DEFAULT_OIDC_BASE.to_string(),
            api_base_url: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("email", &self.email)
            .field("vehicle_identifier", &self.vehicle_identifier)
            .field("has_password", &self.password.is_some())
            .field("daily_request_limit", &self.daily_request_limit)
            .field("scan_interval_secs", &self.scan_interval_secs)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Checks the settings, returning warnings for usable but risky values.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if a required value is missing or a
    /// limit is zero.
    pub fn validate(&self) -> Result<Vec<String>, StoreError> {
        let required = [
            ("email", &self.email),
            ("vehicle_identifier", &self.vehicle_identifier),
            ("application_key", &self.application_key),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(StoreError::Config(format!("{name} is not set")));
        }
        if self.daily_request_limit == 0 {
            return Err(StoreError::Config("daily_request_limit must be positive".into()));
        }
        if self.retry.max_retries > MAX_RETRIES {
            return Err(StoreError::Config(format!(
                "retry.max_retries must be at most {MAX_RETRIES}"
            )));
        }
        if self.budget_period_secs == 0 || self.request_timeout_secs == 0 {
            return Err(StoreError::Config(
                "budget_period_secs and request_timeout_secs must be positive".into(),
            ));
        }
        self.api_urls()?;

        let mut warnings = Vec::new();
        let projected = self.projected_calls_per_window();
        if projected > u64::from(self.daily_request_limit) {
            warnings.push(format!(
                "scan interval of {}s needs about {projected} calls per window, above the limit of {}",
                self.scan_interval_secs, self.daily_request_limit
            ));
        }
        if self.password.is_some() {
            warnings.push("password is stored in the settings file; prefer the keychain".into());
        }
        Ok(warnings)
    }

    /// Calls a poller refreshing every endpoint each scan interval would make
    /// in one budget window.
    pub fn projected_calls_per_window(&self) -> u64 {
        let catalog = self.catalog();
        catalog
            .endpoints()
            .iter()
            .map(|endpoint| {
                let ttl = u64::try_from(endpoint.ttl.num_seconds()).unwrap_or(0);
                let every = ttl.max(self.scan_interval_secs).max(1);
                self.budget_period_secs.div_ceil(every)
            })
            .sum()
    }

    /// The endpoint catalog with TTL overrides applied.
    pub fn catalog(&self) -> EndpointCatalog {
        self.ttl_overrides
            .iter()
            .fold(EndpointCatalog::default(), |catalog, (id, secs)| {
                catalog.with_ttl(*id, chrono::Duration::seconds(to_i64(*secs)))
            })
    }

    /// The retry policy for data calls.
    pub fn retry_strategy(&self) -> RetryStrategy {
        RetryStrategy::new(self.retry.max_retries.min(MAX_RETRIES))
            .with_base_delay(Duration::from_millis(self.retry.base_delay_ms))
            .with_exponential_backoff(self.retry.exponential_backoff)
            .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
    }

    /// Base URLs of the identity provider and data API.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if either URL does not parse.
    pub fn api_urls(&self) -> Result<ApiUrls, StoreError> {
        ApiUrls::new(&self.oidc_base_url, &self.api_base_url)
            .map_err(|e| StoreError::Config(format!("invalid base URL: {e}")))
    }

    /// Auth exchange settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if a base URL does not parse.
    pub fn auth_config(&self) -> Result<AuthConfig, StoreError> {
        Ok(AuthConfig {
            urls: self.api_urls()?,
            timeout: self.request_timeout(),
            grace: chrono::Duration::seconds(to_i64(self.token_grace_secs)),
        })
    }

    /// Timeout for each HTTP request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Length of the budget window.
    pub fn budget_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(to_i64(self.budget_period_secs))
    }

    /// Interval between scheduled refreshes.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs.max(1))
    }

    /// Builds credentials from these settings and a resolved password.
    pub fn credentials(&self, password: impl Into<String>) -> Credentials {
        Credentials::new(
            &self.email,
            password,
            &self.application_key,
            &self.vehicle_identifier,
        )
    }
}

fn to_i64(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

// ============================================================================
// Password Resolution
// ============================================================================

/// Finds the account password: environment, then keychain, then file.
///
/// # Errors
///
/// Returns [`StoreError::MissingPassword`] if no source has one.
pub fn resolve_password(settings: &Settings) -> Result<String, StoreError> {
    resolve_password_from(settings, std::env::var(PASSWORD_ENV).ok(), || {
        keychain::get_password(&settings.email)
    })
}

fn resolve_password_from(
    settings: &Settings,
    env: Option<String>,
    keychain: impl FnOnce() -> Result<Option<String>, StoreError>,
) -> Result<String, StoreError> {
    if let Some(password) = env.filter(|p| !p.is_empty()) {
        debug!(source = PASSWORD_ENV, "Using password from environment");
        return Ok(password);
    }

    match keychain() {
        Ok(Some(password)) => return Ok(password),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Keychain unavailable"),
    }

    settings
        .password
        .clone()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| StoreError::MissingPassword(settings.email.clone()))
}

// ============================================================================
// Settings Store
// ============================================================================

/// Settings bound to a file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
    path: PathBuf,
}

impl SettingsStore {
    /// Creates a store holding defaults.
    pub fn new(path: PathBuf) -> Self {
        Self {
            settings: Arc::new(RwLock::new(Settings::default())),
            path,
        }
    }

    /// Loads settings from the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub async fn load_default() -> Result<Self, StoreError> {
        Self::load(default_settings_path()).await
    }

    /// Loads settings from `path`, using defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let settings = if tokio::fs::try_exists(&path).await? {
            info!(path = %path.display(), "Loading settings");
            load_json(&path).await?
        } else {
            debug!(path = %path.display(), "Settings file not found, using defaults");
            Settings::default()
        };

        Ok(Self {
            settings: Arc::new(RwLock::new(settings)),
            path,
        })
    }

    /// The file this store saves to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets a copy of the current settings.
    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Applies `f` to the settings. Call [`save`](Self::save) to persist.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        f(&mut *self.settings.write().await);
    }

    /// Saves settings to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self) -> Result<(), StoreError> {
        let settings = self.settings.read().await;
        save_json(&self.path, &*settings).await?;
        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Settings {
        Settings {
            email: "driver@example.com".into(),
            vehicle_identifier: "YSMYKEAE1RB000123".into(),
            application_key: "app-key".into(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.daily_request_limit, 10_000);
        assert_eq!(settings.budget_period(), chrono::Duration::hours(24));
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.retry.max_retries, 2);
        assert_eq!(settings.token_grace_secs, 30);
    }

    #[test]
    fn test_validate_requires_account() {
        let err = Settings::default().validate().unwrap_err();
        assert!(err.to_string().contains("email"));

        let settings = Settings {
            application_key: String::new(),
            ..configured()
        };
        assert!(settings.validate().unwrap_err().to_string().contains("application_key"));

        assert!(configured().validate().unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let settings = Settings {
            daily_request_limit: 0,
            ..configured()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_retries_are_bounded() {
        let settings = Settings {
            retry: RetrySettings {
                max_retries: 5,
                ..RetrySettings::default()
            },
            ..configured()
        };
        assert!(settings.validate().unwrap_err().to_string().contains("max_retries"));
        assert_eq!(settings.retry_strategy().max_retries, MAX_RETRIES);

        assert_eq!(configured().retry_strategy().max_retries, 2);
    }

    #[test]
    fn test_validate_warns_on_fast_polling() {
        let settings = Settings {
            scan_interval_secs: 5,
            ..configured()
        };
        let warnings = settings.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("scan interval"));
    }

    #[test]
    fn test_projected_calls_respect_ttl() {
        let settings = configured();
        // 96 vehicle info calls plus three 30s endpoints and climate, all
        // polled every 60s.
        assert_eq!(settings.projected_calls_per_window(), 96 + 4 * 1_440);
    }

    #[test]
    fn test_ttl_overrides_apply_to_catalog() {
        let mut settings = configured();
        settings.ttl_overrides.insert(EndpointId::Location, 300);
        let catalog = settings.catalog();
        assert_eq!(
            catalog.get(EndpointId::Location).unwrap().ttl,
            chrono::Duration::seconds(300)
        );
        assert_eq!(
            catalog.get(EndpointId::Battery).unwrap().ttl,
            EndpointId::Battery.default_ttl()
        );
    }

    #[test]
    fn test_retry_strategy_from_settings() {
        let strategy = configured().retry_strategy();
        assert_eq!(strategy.max_retries, 2);
        assert_eq!(strategy.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_debug_hides_password() {
        let settings = Settings {
            password: Some("hunter2".into()),
            ..configured()
        };
        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    #[test]
    fn test_password_resolution_order() {
        let mut settings = configured();
        settings.password = Some("from-file".into());

        let env_first =
            resolve_password_from(&settings, Some("from-env".into()), || Ok(Some("kc".into())));
        assert_eq!(env_first.unwrap(), "from-env");

        let keychain_next = resolve_password_from(&settings, None, || Ok(Some("kc".into())));
        assert_eq!(keychain_next.unwrap(), "kc");

        let file_last = resolve_password_from(&settings, Some(String::new()), || {
            Err(StoreError::Keychain("locked".into()))
        });
        assert_eq!(file_last.unwrap(), "from-file");

        settings.password = None;
        let missing = resolve_password_from(&settings, None, || Ok(None));
        assert!(matches!(missing, Err(StoreError::MissingPassword(_))));
    }

    #[test]
    fn test_password_not_serialized_when_absent() {
        let json = serde_json::to_value(configured()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["email"], "driver@example.com");
    }

    #[tokio::test]
    async fn test_store_update_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone());

        store.update(|s| s.scan_interval_secs = 120).await;
        store.save().await.unwrap();

        let reloaded = SettingsStore::load(path).await.unwrap();
        assert_eq!(reloaded.get().await.scan_interval_secs, 120);
    }
}
