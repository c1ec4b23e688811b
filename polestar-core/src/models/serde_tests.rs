//! Serde serialization/deserialization tests for core types.
//!
//! These pin the JSON shapes that settings files, diagnostics output, and
//! the CLI's `--format json` rely on.

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;

use crate::{Credentials, EndpointId, Field, FieldValue, TelemetryValue};

// ============================================================================
// Identifier Serde Tests
// ============================================================================

#[test]
fn test_endpoint_id_serializes_snake_case() {
    let test_cases = vec![
        (EndpointId::VehicleInformation, r#""vehicle_information""#),
        (EndpointId::Odometer, r#""odometer""#),
        (EndpointId::Battery, r#""battery""#),
        (EndpointId::Location, r#""location""#),
        (EndpointId::Climate, r#""climate""#),
    ];

    for (id, expected) in test_cases {
        assert_eq!(serde_json::to_string(&id).unwrap(), expected);
    }
}

#[test]
fn test_field_invalid_deserialize() {
    let result: Result<Field, _> = serde_json::from_str(r#""flux_capacitor""#);
    assert!(result.is_err());
}

// ============================================================================
// TelemetryValue Serde Tests
// ============================================================================

#[test]
fn test_telemetry_value_untagged_shapes() {
    assert_eq!(serde_json::to_value(TelemetryValue::Integer(80)).unwrap(), json!(80));
    assert_eq!(serde_json::to_value(TelemetryValue::Bool(true)).unwrap(), json!(true));
    assert_eq!(
        serde_json::to_value(TelemetryValue::Text("Charging".into())).unwrap(),
        json!("Charging")
    );
    assert_eq!(
        serde_json::to_value(TelemetryValue::Date(
            NaiveDate::from_ymd_opt(2021, 3, 15).unwrap()
        ))
        .unwrap(),
        json!("2021-03-15")
    );
}

#[test]
fn test_telemetry_value_deserialize_prefers_typed_variants() {
    let int: TelemetryValue = serde_json::from_str("42").unwrap();
    assert_eq!(int, TelemetryValue::Integer(42));

    let float: TelemetryValue = serde_json::from_str("42.5").unwrap();
    assert_eq!(float, TelemetryValue::Float(42.5));

    let text: TelemetryValue = serde_json::from_str(r#""Idle""#).unwrap();
    assert_eq!(text, TelemetryValue::Text("Idle".into()));
}

// ============================================================================
// FieldValue Serde Tests
// ============================================================================

#[test]
fn test_field_value_json_shape() {
    let value = FieldValue {
        field: Field::BatteryLevel,
        value: Some(TelemetryValue::Integer(64)),
        last_updated: Utc.with_ymd_and_hms(2026, 10, 1, 10, 0, 0).unwrap(),
        source_endpoint: EndpointId::Battery,
        stale: false,
    };

    let json = serde_json::to_value(&value).unwrap();
    assert_eq!(json["field"], "battery_level");
    assert_eq!(json["value"], 64);
    assert_eq!(json["source_endpoint"], "battery");
    assert_eq!(json["stale"], false);

    let parsed: FieldValue = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, value);
}

#[test]
fn test_unavailable_field_value_serializes_null() {
    let value = FieldValue {
        field: Field::Heading,
        value: None,
        last_updated: Utc::now(),
        source_endpoint: EndpointId::Location,
        stale: true,
    };
    let json = serde_json::to_value(&value).unwrap();
    assert!(json["value"].is_null());
}

// ============================================================================
// Credentials Serde Tests
// ============================================================================

#[test]
fn test_credentials_deserialize_without_password() {
    let json = r#"{
        "email": "driver@example.com",
        "application_key": "key",
        "vehicle_identifier": "VIN1"
    }"#;
    let creds: Credentials = serde_json::from_str(json).unwrap();
    assert!(creds.password.is_empty());
    assert_eq!(creds.vehicle_identifier, "VIN1");
}
