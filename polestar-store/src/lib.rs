// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Polestar Bridge Store
//!
//! Cached, quota-aware access to vehicle telemetry.
//!
//! This crate provides:
//!
//! - **VehicleDataFacade**: `get`, `subscribe`, and `refresh_all` for one vehicle
//! - **FetchCoordinator**: Cache, request coalescing, budget, auth, and retry
//! - **EndpointCache**: Latest payload per endpoint, stale entries retained
//! - **Diagnostics**: Budget, session, and per-endpoint health
//! - **Settings**: Account and polling settings with persistence
//!
//! ## Usage
//!
//! ```ignore
//! use polestar_core::Field;
//! use polestar_store::{SettingsStore, VehicleDataFacade, resolve_password};
//!
//! let settings = SettingsStore::load_default().await?.get().await;
//! let credentials = settings.credentials(resolve_password(&settings)?);
//! let facade = VehicleDataFacade::builder(credentials)
//!     .settings(&settings)?
//!     .build()?;
//!
//! facade.subscribe(Field::BatteryLevel, |value| {
//!     println!("battery: {}", value.display_value());
//! })?;
//! facade.refresh_all().await;
//! ```

pub mod cache;
pub mod coordinator;
pub mod diagnostics;
pub mod error;
pub mod facade;
pub mod keychain;
pub mod persistence;
pub mod settings;
pub mod subscriptions;

pub use cache::{CacheEntry, EndpointCache};
pub use coordinator::{FetchCoordinator, RefreshReport};
pub use diagnostics::{Diagnostics, EndpointStatus};
pub use error::{DataError, StoreError};
pub use facade::{FacadeBuilder, VehicleDataFacade};
pub use persistence::{
    default_config_dir, default_settings_path, load_json, load_json_or_default, save_json,
};
pub use settings::{PASSWORD_ENV, RetrySettings, Settings, SettingsStore, resolve_password};
pub use subscriptions::{Callback, SubscriptionId};
