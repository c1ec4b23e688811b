//! CLI output formatting tests.
//!
//! These tests verify that CLI output is correctly formatted for both
//! text and JSON output modes.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use polestar_core::{EndpointCatalog, EndpointId, Field, FieldValue, TelemetryValue};
use polestar_fetch::{AuthError, BudgetSnapshot};
use polestar_store::{DataError, Diagnostics, EndpointStatus};

fn reading(field: Field, value: Option<TelemetryValue>, stale: bool) -> FieldValue {
    FieldValue {
        field,
        value,
        last_updated: Utc::now(),
        source_endpoint: field.endpoint(),
        stale,
    }
}

fn diagnostics(remaining: u32) -> Diagnostics {
    let mut endpoints = BTreeMap::new();
    endpoints.insert(
        EndpointId::Battery,
        EndpointStatus {
            last_success: Some(Utc::now()),
            last_status: Some(200),
            calls: 2,
            fresh: true,
            cached_at: Some(Utc::now()),
            ..EndpointStatus::default()
        },
    );
    endpoints.insert(
        EndpointId::Odometer,
        EndpointStatus {
            last_status: Some(503),
            last_error: Some("HTTP 503".into()),
            calls: 1,
            ..EndpointStatus::default()
        },
    );

    Diagnostics {
        budget: BudgetSnapshot {
            limit: 100,
            used: 100 - remaining,
            remaining,
            window_start: Some(Utc::now()),
            resets_at: Some(Utc::now() + Duration::hours(3)),
        },
        token_expires_at: Some(Utc::now() + Duration::minutes(50)),
        token_valid: true,
        credentials_rejected: false,
        auth_status: Some(200),
        data_status: Some(200),
        endpoints,
    }
}

mod text_formatter_tests {
    use super::super::text::TextFormatter;
    use super::*;

    #[test]
    fn test_progress_bar_empty() {
        let formatter = TextFormatter::new(false);
        let bar = formatter.progress_bar(0.0);
        assert_eq!(bar, "░░░░░░░░░░");
    }

    #[test]
    fn test_progress_bar_full() {
        let formatter = TextFormatter::new(false);
        let bar = formatter.progress_bar(100.0);
        assert_eq!(bar, "██████████");
    }

    #[test]
    fn test_progress_bar_boundary_values() {
        let formatter = TextFormatter::new(false);

        let test_cases = vec![
            (0.0, "░░░░░░░░░░"),
            (10.0, "█░░░░░░░░░"),
            (25.0, "███░░░░░░░"), // 2.5 rounds to 3 blocks
            (50.0, "█████░░░░░"),
            (100.0, "██████████"),
            (150.0, "██████████"),
        ];

        for (percent, expected) in test_cases {
            let bar = formatter.progress_bar(percent);
            assert_eq!(bar, expected, "Failed for {percent}%");
        }
    }

    #[test]
    fn test_progress_bar_with_colors() {
        let formatter = TextFormatter::new(true);

        assert!(formatter.progress_bar(10.0).contains("\x1b[31m"), "red below 20%");
        assert!(formatter.progress_bar(30.0).contains("\x1b[33m"), "yellow below 50%");
        assert!(formatter.progress_bar(80.0).contains("\x1b[32m"), "green otherwise");
    }

    #[test]
    fn test_format_read_value_with_unit() {
        let formatter = TextFormatter::new(false);
        let result = Ok(reading(
            Field::BatteryLevel,
            Some(TelemetryValue::Integer(80)),
            false,
        ));

        let line = formatter.format_read("battery_level", &result);
        assert!(line.starts_with("battery_level"));
        assert!(line.contains("80 %"));
        assert!(!line.contains("stale"));
    }

    #[test]
    fn test_format_read_marks_stale() {
        let formatter = TextFormatter::new(false);
        let result = Ok(reading(
            Field::EstimatedRange,
            Some(TelemetryValue::Integer(312)),
            true,
        ));

        let line = formatter.format_read("estimated_range", &result);
        assert!(line.contains("312 km"));
        assert!(line.contains("(stale"));
    }

    #[test]
    fn test_format_read_unavailable_and_error() {
        let formatter = TextFormatter::new(false);

        let missing = Ok(reading(Field::Heading, None, false));
        assert!(formatter.format_read("heading", &missing).contains("unavailable"));

        let failed: Result<FieldValue, DataError> =
            Err(DataError::UnknownField("warp_factor".into()));
        let line = formatter.format_read("warp_factor", &failed);
        assert!(line.starts_with("warp_factor"));
        assert!(line.contains("warp_factor"));
    }

    #[test]
    fn test_format_catalog_lists_every_field() {
        let formatter = TextFormatter::new(false);
        let catalog = EndpointCatalog::default();
        let output = formatter.format_catalog(&catalog);

        assert!(output.contains("Field"));
        for field in catalog.fields() {
            assert!(output.contains(field.name()), "missing {}", field.name());
        }
        assert!(output.contains("30s"));
        assert!(output.contains("15m"));
    }

    #[test]
    fn test_format_diagnostics() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_diagnostics(&diagnostics(40));

        assert!(output.contains("✓ connected"));
        assert!(output.contains("40/100 calls left"));
        assert!(output.contains("████░░░░░░"));
        assert!(output.contains("Resets in"));
        assert!(output.contains("battery"));
        assert!(output.contains("fresh"));
        assert!(output.contains("HTTP 503"));
        assert!(output.contains("never"));
    }

    #[test]
    fn test_format_diagnostics_rejected_credentials() {
        let formatter = TextFormatter::new(false);
        let mut diag = diagnostics(100);
        diag.credentials_rejected = true;
        diag.token_valid = false;

        let output = formatter.format_diagnostics(&diag);
        assert!(output.contains("✗ not connected"));
        assert!(output.contains("credentials rejected"));
    }

    #[test]
    fn test_format_age_and_reset_time() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.format_age(Utc::now() - Duration::minutes(5)), "5m ago");
        assert_eq!(formatter.format_age(Utc::now() - Duration::days(2)), "2d ago");
        assert_eq!(formatter.format_reset_time(Utc::now() - Duration::seconds(1)), "now");
    }
}

mod json_formatter_tests {
    use super::super::json::JsonFormatter;
    use super::*;

    #[test]
    fn test_format_pretty_json() {
        let formatter = JsonFormatter::new(true);
        let json = formatter.format(&serde_json::json!({"a": 1})).unwrap();
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_format_compact_json() {
        let formatter = JsonFormatter::new(false);
        let json = formatter.format(&serde_json::json!({"a": 1})).unwrap();
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_format_single_read_is_object() {
        let formatter = JsonFormatter::new(false);
        let reads = vec![(
            "battery_level".to_string(),
            Ok(reading(Field::BatteryLevel, Some(TelemetryValue::Integer(80)), true)),
        )];

        let json = formatter.format_reads(&reads).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["field"], "battery_level");
        assert_eq!(parsed["endpoint"], "battery");
        assert_eq!(parsed["value"], 80);
        assert_eq!(parsed["unit"], "%");
        assert_eq!(parsed["stale"], true);
        assert!(parsed.get("error").is_none());
        assert!(parsed.get("lastUpdated").is_some());
    }

    #[test]
    fn test_format_reads_with_error() {
        let formatter = JsonFormatter::new(false);
        let reads = vec![
            (
                "heading".to_string(),
                Ok(reading(Field::Heading, None, false)),
            ),
            (
                "odometer".to_string(),
                Err(DataError::Auth(AuthError::InvalidCredentials)),
            ),
        ];

        let json = formatter.format_reads(&reads).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let list = parsed.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[0]["value"].is_null());
        assert_eq!(list[1]["field"], "odometer");
        assert!(list[1]["error"].is_string());
        assert!(list[1].get("endpoint").is_none());
    }

    #[test]
    fn test_format_catalog_json() {
        let formatter = JsonFormatter::new(false);
        let json = formatter.format_catalog(&EndpointCatalog::default()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let list = parsed.as_array().unwrap();

        let battery = list
            .iter()
            .find(|f| f["field"] == "battery_level")
            .unwrap();
        assert_eq!(battery["endpoint"], "battery");
        assert_eq!(battery["operation"], "GetBatteryData");
        assert_eq!(battery["ttlSecs"], 30);
    }

    #[test]
    fn test_format_diagnostics_json() {
        let formatter = JsonFormatter::new(false);
        let json = formatter.format(&diagnostics(7)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["budget"]["remaining"], 7);
        assert_eq!(parsed["endpoints"]["odometer"]["last_status"], 503);
    }
}
