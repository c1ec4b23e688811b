//! Get command - one-shot field reads.

use anyhow::{Result, bail};
use clap::Args;
use futures::future::join_all;
use polestar_core::FieldValue;
use polestar_store::DataError;
use tracing::debug;

use super::{connect, exit_code_for_data};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the get command.
#[derive(Args)]
pub struct GetArgs {
    /// Field names, e.g. `battery_level estimated_range`.
    pub fields: Vec<String>,

    /// Read every known field.
    #[arg(long, short, conflicts_with = "fields")]
    pub all: bool,
}

/// Runs the get command.
pub async fn run(args: &GetArgs, cli: &Cli) -> Result<()> {
    if args.fields.is_empty() && !args.all {
        bail!("No fields given. Pass field names or --all (see `polestar fields`)");
    }

    let (facade, _) = connect(cli).await?;

    let names: Vec<String> = if args.all {
        facade.catalog().fields().map(|f| f.name().to_string()).collect()
    } else {
        args.fields.clone()
    };
    debug!(count = names.len(), "Reading fields");

    // Reads of fields on the same endpoint share one upstream call.
    let results = join_all(names.iter().map(|name| facade.get_by_name(name))).await;
    let reads: Vec<(String, Result<FieldValue, DataError>)> =
        names.into_iter().zip(results).collect();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            for (name, result) in &reads {
                println!("{}", formatter.format_read(name, result));
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_reads(&reads)?);
        }
    }

    if let Some(code) = failure_code(&reads) {
        code.exit();
    }
    Ok(())
}

/// Exit code when no read produced a value, taken from the first failure.
fn failure_code(reads: &[(String, Result<FieldValue, DataError>)]) -> Option<ExitCode> {
    if reads.iter().any(|(_, r)| r.is_ok()) {
        return None;
    }
    reads
        .iter()
        .find_map(|(_, r)| r.as_ref().err())
        .map(exit_code_for_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use polestar_core::{EndpointId, Field};
    use polestar_fetch::AuthError;

    fn ok(field: Field) -> Result<FieldValue, DataError> {
        Ok(FieldValue {
            field,
            value: None,
            last_updated: Utc::now(),
            source_endpoint: field.endpoint(),
            stale: true,
        })
    }

    #[test]
    fn test_any_success_is_not_a_failure() {
        let reads = vec![
            ("battery_level".to_string(), ok(Field::BatteryLevel)),
            (
                "odometer".to_string(),
                Err(DataError::QuotaExhausted(EndpointId::Odometer)),
            ),
        ];
        assert_eq!(failure_code(&reads), None);
    }

    #[test]
    fn test_all_failed_uses_first_error() {
        let reads = vec![
            (
                "battery_level".to_string(),
                Err(DataError::Auth(AuthError::InvalidCredentials)),
            ),
            (
                "odometer".to_string(),
                Err(DataError::QuotaExhausted(EndpointId::Odometer)),
            ),
        ];
        assert_eq!(failure_code(&reads), Some(ExitCode::AuthFailed));

        let reads = vec![(
            "odometer".to_string(),
            Err(DataError::QuotaExhausted(EndpointId::Odometer)),
        )];
        assert_eq!(failure_code(&reads), Some(ExitCode::Unavailable));
    }
}
