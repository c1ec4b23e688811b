//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Duration, Local, Utc};
use polestar_core::{EndpointCatalog, FieldValue};
use polestar_store::{DataError, Diagnostics, EndpointStatus};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    // ========================================================================
    // Field Reads
    // ========================================================================

    /// Formats one field read as `name  value unit`.
    pub fn format_read(&self, name: &str, result: &Result<FieldValue, DataError>) -> String {
        match result {
            Ok(value) => {
                let shown = value.display_value();
                let shown = if value.is_available() {
                    self.cyan(&shown)
                } else {
                    self.dim(&shown)
                };

                let mut line = format!("{:<44} {}", value.field.name(), shown);
                if value.stale {
                    line.push_str(&format!(
                        " {}",
                        self.yellow(&format!("(stale, {})", self.format_age(value.last_updated)))
                    ));
                }
                line
            }
            Err(e) => format!("{name:<44} {}", self.red(&e.to_string())),
        }
    }

    /// Formats a change notification from `watch`.
    pub fn format_change(&self, value: &FieldValue) -> String {
        let time = value.last_updated.with_timezone(&Local).format("%H:%M:%S");
        format!(
            "{} {:<44} {}",
            self.dim(&time.to_string()),
            value.field.name(),
            self.cyan(&value.display_value())
        )
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    /// Formats the field catalog as a table.
    pub fn format_catalog(&self, catalog: &EndpointCatalog) -> String {
        let mut lines = vec![format!(
            "{:<44} {:<20} {:>6}  {}",
            "Field", "Endpoint", "TTL", "Unit"
        )];
        lines.push("─".repeat(80));

        for endpoint in catalog.endpoints() {
            for field in &endpoint.produces {
                lines.push(format!(
                    "{:<44} {:<20} {:>6}  {}",
                    field.name(),
                    endpoint.id.as_str(),
                    format_ttl(endpoint.ttl),
                    field.unit().unwrap_or("−"),
                ));
            }
        }

        lines.join("\n")
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Formats a diagnostics snapshot.
    pub fn format_diagnostics(&self, diag: &Diagnostics) -> String {
        let mut lines = Vec::new();

        lines.push(self.bold("Polestar Bridge Status"));
        lines.push("─".repeat(50));

        let connected = if diag.api_connected() {
            self.green("✓ connected")
        } else {
            self.red("✗ not connected")
        };
        lines.push(format!("API:      {connected}"));

        let budget = &diag.budget;
        #[allow(clippy::cast_precision_loss)]
        let percent_left = if budget.limit == 0 {
            0.0
        } else {
            f64::from(budget.remaining) / f64::from(budget.limit) * 100.0
        };
        lines.push(format!(
            "Budget:   {} {}/{} calls left",
            self.progress_bar(percent_left),
            budget.remaining,
            budget.limit
        ));
        if let Some(resets_at) = budget.resets_at {
            lines.push(format!("          Resets {}", self.dim(&self.format_reset_time(resets_at))));
        }

        let session = match (diag.credentials_rejected, diag.token_expires_at) {
            (true, _) => self.red("credentials rejected"),
            (false, Some(expires)) if diag.token_valid => {
                format!("valid, expires {}", self.format_reset_time(expires))
            }
            (false, Some(_)) => self.yellow("expired"),
            (false, None) => self.dim("not logged in"),
        };
        lines.push(format!("Session:  {session}"));

        lines.push(String::new());
        lines.push(format!(
            "{:<20} {:<8} {:>6} {:>6}  {}",
            "Endpoint", "Cache", "Status", "Calls", "Last success"
        ));
        for (id, status) in &diag.endpoints {
            lines.push(self.format_endpoint(id.as_str(), status));
        }

        lines.join("\n")
    }

    fn format_endpoint(&self, name: &str, status: &EndpointStatus) -> String {
        let cache = match (status.cached_at, status.fresh) {
            (None, _) => self.dim("empty"),
            (Some(_), true) => self.green("fresh"),
            (Some(_), false) => self.yellow("stale"),
        };
        let http = status
            .last_status
            .map_or_else(|| "−".to_string(), |s| s.to_string());
        let success = status
            .last_success
            .map_or_else(|| "never".to_string(), |t| self.format_age(t));

        let mut line = format!(
            "{name:<20} {cache:<8} {http:>6} {:>6}  {success}",
            status.calls
        );
        if let Some(error) = &status.last_error {
            line.push_str(&format!("\n{:<20} {}", "", self.red(error)));
        }
        line
    }

    /// Formats a progress bar.
    pub fn progress_bar(&self, percent_remaining: f64) -> String {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let filled = ((percent_remaining.clamp(0.0, 100.0) / 100.0) * self.bar_width as f64)
            .round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_percent(percent_remaining, &bar)
    }

    /// Formats a future time as a countdown or an absolute time.
    pub fn format_reset_time(&self, at: DateTime<Utc>) -> String {
        let now = Utc::now();
        if at <= now {
            return "now".to_string();
        }

        let diff = at - now;
        if diff < Duration::hours(1) {
            let mins = diff.num_minutes();
            format!("in {} minute{}", mins, if mins == 1 { "" } else { "s" })
        } else if diff < Duration::hours(24) {
            let hours = diff.num_hours();
            let mins = diff.num_minutes() % 60;
            if mins > 0 {
                format!("in {hours}h {mins}m")
            } else {
                format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
            }
        } else {
            let local = at.with_timezone(&Local);
            local.format("%a at %l:%M %p").to_string().trim().to_string()
        }
    }

    /// Formats a past time as an age.
    pub fn format_age(&self, at: DateTime<Utc>) -> String {
        let age = Utc::now() - at;
        if age < Duration::minutes(1) {
            format!("{}s ago", age.num_seconds().max(0))
        } else if age < Duration::hours(1) {
            format!("{}m ago", age.num_minutes())
        } else if age < Duration::days(1) {
            format!("{}h ago", age.num_hours())
        } else {
            format!("{}d ago", age.num_days())
        }
    }

    // ========================================================================
    // Color Helpers
    // ========================================================================

    fn color_for_percent(&self, percent: f64, text: &str) -> String {
        if percent < 20.0 {
            self.red(text)
        } else if percent < 50.0 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

fn format_ttl(ttl: Duration) -> String {
    let secs = ttl.num_seconds();
    if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
