//! Fields command - list the field catalog.

use anyhow::Result;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the fields command. Needs no credentials and makes no calls.
pub fn run(cli: &Cli) -> Result<()> {
    // Settings only tweak TTLs here; an unreadable file falls back to defaults.
    let catalog = std::fs::read_to_string(cli.settings_path())
        .ok()
        .and_then(|s| serde_json::from_str::<polestar_store::Settings>(&s).ok())
        .unwrap_or_default()
        .catalog();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_catalog(&catalog));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_catalog(&catalog)?);
        }
    }

    Ok(())
}
