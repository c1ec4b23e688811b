//! CLI command implementations.

pub mod config;
pub mod fields;
pub mod get;
pub mod status;
pub mod watch;

use anyhow::{Context, Result};
use polestar_store::{
    DataError, Settings, SettingsStore, StoreError, VehicleDataFacade, resolve_password,
};
use tracing::{debug, warn};

use crate::{Cli, ExitCode};

/// Loads settings and builds a facade from them.
pub async fn connect(cli: &Cli) -> Result<(VehicleDataFacade, Settings)> {
    let path = cli.settings_path();
    let settings = SettingsStore::load(path.clone())
        .await
        .with_context(|| format!("loading settings from {}", path.display()))?
        .get()
        .await;

    for warning in settings.validate()? {
        warn!("{warning}");
    }

    let password = resolve_password(&settings)?;
    let facade = VehicleDataFacade::builder(settings.credentials(password))
        .settings(&settings)?
        .build()?;

    debug!(vin = facade.vehicle_identifier(), "Connected");
    Ok((facade, settings))
}

/// Maps an error to the process exit code.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(store) = err.downcast_ref::<StoreError>() {
        return match store {
            StoreError::Config(_) | StoreError::MissingPassword(_) => ExitCode::ConfigError,
            _ => ExitCode::Error,
        };
    }
    if let Some(data) = err.downcast_ref::<DataError>() {
        return exit_code_for_data(data);
    }
    ExitCode::Error
}

/// Maps a read failure to the process exit code.
pub fn exit_code_for_data(err: &DataError) -> ExitCode {
    match err {
        DataError::Auth(_) => ExitCode::AuthFailed,
        DataError::UnknownField(_) => ExitCode::ConfigError,
        _ => ExitCode::Unavailable,
    }
}
