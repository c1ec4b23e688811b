//! Config command - manage settings and the stored password.

use std::io::{BufRead, IsTerminal};

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use polestar_store::{SettingsStore, default_config_dir, keychain};
use tracing::info;

use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current settings (password hidden).
    Show,

    /// Show configuration paths.
    Path,

    /// Write a settings file with account and vehicle details.
    Init {
        /// Account email.
        #[arg(long)]
        email: String,

        /// Vehicle identification number.
        #[arg(long)]
        vin: String,

        /// Application key sent with data requests.
        #[arg(long)]
        application_key: String,

        /// Overwrite an existing settings file.
        #[arg(long)]
        force: bool,
    },

    /// Store the account password in the system keychain.
    SetPassword {
        /// Password. Read from stdin when omitted.
        password: Option<String>,
    },

    /// Reset to defaults and forget the stored password.
    Reset,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli).await,
        ConfigAction::Path => show_paths(cli),
        ConfigAction::Init {
            email,
            vin,
            application_key,
            force,
        } => init_config(cli, email, vin, application_key, *force).await,
        ConfigAction::SetPassword { password } => set_password(cli, password.as_deref()).await,
        ConfigAction::Reset => reset_config(cli).await,
    }
}

async fn show_config(cli: &Cli) -> Result<()> {
    let store = SettingsStore::load(cli.settings_path()).await?;
    let mut settings = store.get().await;
    settings.password = None;

    match cli.format {
        OutputFormat::Text => {
            println!("Polestar Bridge Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Email:              {}", or_unset(&settings.email));
            println!("Vehicle:            {}", or_unset(&settings.vehicle_identifier));
            println!(
                "Application key:    {}",
                if settings.application_key.is_empty() { "(not set)" } else { "(set)" }
            );
            println!("Daily request limit: {}", settings.daily_request_limit);
            println!(
                "Scan interval:      {}s ({} calls per window projected)",
                settings.scan_interval_secs,
                settings.projected_calls_per_window()
            );
            println!("Request timeout:    {}s", settings.request_timeout_secs);
            println!("Max retries:        {}", settings.retry.max_retries);
            for (endpoint, ttl) in &settings.ttl_overrides {
                println!("TTL {endpoint}: {ttl}s");
            }
            match settings.validate() {
                Ok(warnings) => {
                    for warning in warnings {
                        println!("warning: {warning}");
                    }
                }
                Err(e) => println!("error: {e}"),
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&settings)?);
        }
    }

    Ok(())
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() { "(not set)" } else { value }
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let settings_path = cli.settings_path();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Settings file: {}", settings_path.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "settings_file": settings_path.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

async fn init_config(
    cli: &Cli,
    email: &str,
    vin: &str,
    application_key: &str,
    force: bool,
) -> Result<()> {
    let path = cli.settings_path();
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }

    let store = SettingsStore::new(path);
    store
        .update(|s| {
            s.email = email.trim().to_string();
            s.vehicle_identifier = vin.trim().to_uppercase();
            s.application_key = application_key.trim().to_string();
        })
        .await;

    for warning in store.get().await.validate()? {
        eprintln!("warning: {warning}");
    }
    store.save().await?;

    info!(path = %store.path().display(), "Settings initialised");
    println!("Wrote {}", store.path().display());
    println!("Next: polestar config set-password");
    Ok(())
}

async fn set_password(cli: &Cli, password: Option<&str>) -> Result<()> {
    let settings = SettingsStore::load(cli.settings_path()).await?.get().await;
    if settings.email.is_empty() {
        bail!("No email configured; run `polestar config init` first");
    }

    let password = match password {
        Some(p) => p.to_string(),
        None => read_password_line()?,
    };
    if password.is_empty() {
        bail!("Password is empty");
    }

    let email = settings.email.clone();
    tokio::task::spawn_blocking(move || keychain::store_password(&email, &password))
        .await
        .context("keychain task failed")??;

    info!(email = %settings.email, "Password stored");
    println!("Password stored in keychain for {}", settings.email);
    Ok(())
}

fn read_password_line() -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprint!("Password: ");
    }
    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn reset_config(cli: &Cli) -> Result<()> {
    let path = cli.settings_path();

    if path.exists() {
        let settings = SettingsStore::load(path.clone()).await?.get().await;
        if !settings.email.is_empty() {
            keychain::delete_password(&settings.email)?;
        }
        tokio::fs::remove_file(&path).await?;
        info!(path = %path.display(), "Settings reset");
        println!("Configuration reset to defaults");
    } else {
        println!("No configuration file to reset");
    }

    Ok(())
}
