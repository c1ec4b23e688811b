// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Polestar Bridge CLI - vehicle telemetry from the command line.
//!
//! # Examples
//!
//! ```bash
//! # One-shot reads
//! polestar get battery_level estimated_range
//!
//! # Poll every minute and print changes
//! polestar watch --interval 60
//!
//! # Budget, session, and endpoint health
//! polestar status --format json --pretty
//!
//! # First-time setup
//! polestar config init --email me@example.com --vin YSMYKEAE1RB000123 --application-key KEY
//! polestar config set-password
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, fields, get, status, watch};

// ============================================================================
// CLI Definition
// ============================================================================

/// Polestar Bridge CLI - quota-aware vehicle telemetry.
#[derive(Parser)]
#[command(name = "polestar")]
#[command(about = "Quota-aware Polestar vehicle telemetry")]
#[command(long_about = r"
Reads Polestar vehicle telemetry while staying inside the daily API quota.

Values are cached per endpoint, concurrent reads share one upstream call,
and stale data is served when a fresh fetch is not possible.

Examples:
  polestar get battery_level        # One field
  polestar get --all                # Every field
  polestar watch                    # Poll and print changes
  polestar status                   # Diagnostics
  polestar fields                   # List known fields
")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'status'.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Settings file to use instead of the default.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Read one or more fields.
    #[command(visible_alias = "g")]
    Get(get::GetArgs),

    /// Refresh periodically and print changed fields.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),

    /// List known fields with their endpoint and freshness window.
    Fields,

    /// Refresh once and show diagnostics.
    #[command(visible_alias = "s")]
    Status,

    /// Manage settings and the stored password.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Settings missing or invalid.
    ConfigError = 2,
    /// Credentials rejected or login impossible.
    AuthFailed = 3,
    /// No data available for any requested field.
    Unavailable = 4,
}

impl ExitCode {
    /// Exits the process with this code.
    pub fn exit(self) -> ! {
        std::process::exit(self as i32)
    }
}

impl Cli {
    /// Settings file path, honouring `--config`.
    pub fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(polestar_store::default_settings_path)
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("polestar=debug,info")
    } else {
        EnvFilter::new("polestar=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Get(args)) => get::run(args, &cli).await,
        Some(Commands::Watch(args)) => watch::run(args, &cli).await,
        Some(Commands::Fields) => fields::run(&cli),
        Some(Commands::Status) | None => status::run(&cli).await,
        Some(Commands::Config(args)) => config::run(args, &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        commands::exit_code_for(&e).exit();
    }

    Ok(())
}
