//! Status command - refresh once and show diagnostics.

use anyhow::Result;
use tracing::{info, warn};

use super::connect;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Runs the status command.
pub async fn run(cli: &Cli) -> Result<()> {
    let (facade, _) = connect(cli).await?;

    let report = facade.refresh_all().await;
    info!(
        fresh = report.fresh.len(),
        stale = report.stale.len(),
        failed = report.failed.len(),
        "Refresh finished"
    );
    for (endpoint, err) in &report.failed {
        warn!(%endpoint, error = %err, "No data");
    }

    let diagnostics = facade.diagnostics();
    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_diagnostics(&diagnostics));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&diagnostics)?);
        }
    }

    if diagnostics.credentials_rejected {
        ExitCode::AuthFailed.exit();
    }
    Ok(())
}
