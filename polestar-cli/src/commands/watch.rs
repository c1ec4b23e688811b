//! Watch command - poll on an interval and print changed fields.

use anyhow::Result;
use clap::Args;
use polestar_core::{Field, FieldValue};
use polestar_store::DataError;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{info, warn};

use super::connect;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Refresh interval in seconds. Defaults to the configured scan interval.
    #[arg(long, short, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Fields to watch. Defaults to every field.
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Minimum interval to use.
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub min_interval: u64,
}

impl WatchArgs {
    /// Seconds between refreshes, never below one.
    fn refresh_secs(&self, configured: u64) -> u64 {
        self.interval
            .unwrap_or(configured)
            .max(self.min_interval)
            .max(1)
    }
}

/// Runs the watch command until Ctrl+C.
pub async fn run(args: &WatchArgs, cli: &Cli) -> Result<()> {
    let (facade, settings) = connect(cli).await?;

    let refresh_interval = args.refresh_secs(settings.scan_interval().as_secs());

    let fields: Vec<Field> = if args.fields.is_empty() {
        facade.catalog().fields().collect()
    } else {
        let mut resolved = Vec::with_capacity(args.fields.len());
        for name in &args.fields {
            let (field, _) = facade.catalog().resolve(name)?;
            resolved.push(field);
        }
        resolved
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<FieldValue>();
    let mut subscriptions = Vec::with_capacity(fields.len());
    for field in fields {
        let tx = tx.clone();
        subscriptions.push(facade.subscribe(field, move |value: &FieldValue| {
            let _ = tx.send(value.clone());
        })?);
    }
    drop(tx);

    info!(
        interval = refresh_interval,
        fields = subscriptions.len(),
        "Starting watch mode"
    );

    let text = TextFormatter::new(!cli.no_color);
    let json = JsonFormatter::new(cli.pretty);

    let mut ticker = interval(Duration::from_secs(refresh_interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = facade.refresh_all().await;
                for (endpoint, err) in &report.failed {
                    warn!(%endpoint, error = %err, "Refresh failed");
                }
                if !cli.quiet && !report.is_complete() {
                    info!(remaining = facade.remaining_budget(), "Serving cached data");
                }
            }
            Some(value) = rx.recv() => {
                match cli.format {
                    OutputFormat::Text => println!("{}", text.format_change(&value)),
                    OutputFormat::Json => {
                        let read: (String, Result<FieldValue, DataError>) =
                            (value.field.name().to_string(), Ok(value));
                        println!("{}", json.format_reads(std::slice::from_ref(&read))?);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch mode");
                break;
            }
        }
    }

    for id in subscriptions {
        facade.unsubscribe(id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: WatchArgs,
    }

    fn parse(argv: &[&str]) -> Result<WatchArgs, clap::Error> {
        Harness::try_parse_from(std::iter::once("watch").chain(argv.iter().copied()))
            .map(|h| h.args)
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        assert!(parse(&["--interval", "0"]).is_err());
        assert!(parse(&["--min-interval", "0"]).is_err());
    }

    #[test]
    fn test_refresh_interval_floor() {
        let args = parse(&["--interval", "5"]).unwrap();
        assert_eq!(args.refresh_secs(60), 10);

        let args = parse(&["--interval", "5", "--min-interval", "1"]).unwrap();
        assert_eq!(args.refresh_secs(60), 5);

        // A zero scan interval from settings still yields a usable period.
        let args = WatchArgs {
            interval: None,
            fields: Vec::new(),
            min_interval: 0,
        };
        assert_eq!(args.refresh_secs(0), 1);

        let args = parse(&["--fields", "battery_level,odometer"]).unwrap();
        assert_eq!(args.fields, vec!["battery_level", "odometer"]);
        assert_eq!(args.refresh_secs(60), 60);
    }
}
