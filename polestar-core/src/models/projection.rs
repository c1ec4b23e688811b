//! Projection of raw endpoint payloads into typed field values.
//!
//! Payloads are kept as `serde_json::Value` in the cache; a field's value is
//! recomputed from the payload on every read so that a cache update is the
//! only state change.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;

use super::field::{Field, FieldSource, ValueKind};
use super::value::{ChargerConnectionStatus, ChargingStatus, TelemetryValue};
use crate::error::CoreError;

/// Walks a slash-separated path (`content/model/name`) into a payload.
///
/// Returns `None` if any segment is missing or the leaf is JSON `null`.
pub fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let leaf = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(payload, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })?;
    (!leaf.is_null()).then_some(leaf)
}

/// Projects one field out of its endpoint's payload.
///
/// `fetched_at` anchors derived times such as the estimated charge completion.
pub fn project_field(
    field: Field,
    payload: &Value,
    fetched_at: DateTime<Utc>,
) -> Result<Option<TelemetryValue>, CoreError> {
    match field.source() {
        FieldSource::Path(path) => match lookup(payload, path) {
            Some(raw) => convert(field.kind(), path, raw).map(Some),
            None if field.zero_when_missing() => Ok(Some(TelemetryValue::Integer(0))),
            None => Ok(None),
        },
        FieldSource::Derived => derive(field, payload, fetched_at),
    }
}

fn convert(kind: ValueKind, path: &str, raw: &Value) -> Result<TelemetryValue, CoreError> {
    match kind {
        ValueKind::Text => Ok(TelemetryValue::Text(match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        ValueKind::Integer => number(raw)
            .map(round_to_i64)
            .map(TelemetryValue::Integer)
            .ok_or_else(|| CoreError::invalid_data(path, format!("expected integer, got {raw}"))),
        ValueKind::Float => number(raw)
            .map(TelemetryValue::Float)
            .ok_or_else(|| CoreError::invalid_data(path, format!("expected number, got {raw}"))),
        ValueKind::Boolean => match raw {
            Value::Bool(b) => Ok(TelemetryValue::Bool(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(TelemetryValue::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => {
                Ok(TelemetryValue::Bool(false))
            }
            other => Err(CoreError::invalid_data(
                path,
                format!("expected boolean, got {other}"),
            )),
        },
        ValueKind::Date => raw
            .as_str()
            .and_then(|s| s.get(..10))
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(TelemetryValue::Date)
            .ok_or_else(|| CoreError::invalid_data(path, format!("expected date, got {raw}"))),
        ValueKind::Timestamp => timestamp(raw)
            .map(TelemetryValue::Timestamp)
            .ok_or_else(|| CoreError::invalid_data(path, format!("expected timestamp, got {raw}"))),
        ValueKind::ChargingStatus => Ok(TelemetryValue::Text(
            ChargingStatus::from_code(raw.as_str().unwrap_or_default())
                .display_name()
                .to_string(),
        )),
        ValueKind::ChargerConnection => Ok(TelemetryValue::Text(
            ChargerConnectionStatus::from_code(raw.as_str().unwrap_or_default())
                .display_name()
                .to_string(),
        )),
    }
}

/// Reads a number, accepting strings that start with one (`"78 kWh"`).
fn number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && c == '-')))
                .map_or(s.len(), |(i, _)| i);
            s[..end].parse().ok()
        }
        _ => None,
    }
}

fn timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_to_i64(v: f64) -> i64 {
    v.round() as i64
}

fn derive(
    field: Field,
    payload: &Value,
    fetched_at: DateTime<Utc>,
) -> Result<Option<TelemetryValue>, CoreError> {
    match field {
        Field::EstimatedFullChargeRange => {
            let range = project_number(Field::EstimatedRange, payload, fetched_at)?;
            let level = project_number(Field::BatteryLevel, payload, fetched_at)?;
            Ok(match (range, level) {
                (Some(range), Some(level)) if level > 0.0 => Some(TelemetryValue::Integer(
                    round_to_i64(range / level * 100.0),
                )),
                _ => None,
            })
        }
        Field::EstimatedFullyChargedTime => {
            let charging = lookup(payload, "chargingStatus")
                .and_then(Value::as_str)
                .map(ChargingStatus::from_code)
                == Some(ChargingStatus::Charging);
            let minutes = project_number(Field::EstimatedChargingTimeToFull, payload, fetched_at)?;
            Ok(match minutes {
                Some(minutes) if charging && minutes > 0.0 => Some(TelemetryValue::Timestamp(
                    fetched_at + Duration::minutes(round_to_i64(minutes)),
                )),
                _ => None,
            })
        }
        other => Err(CoreError::invalid_data(
            other.name(),
            "field has no derivation",
        )),
    }
}

fn project_number(
    field: Field,
    payload: &Value,
    fetched_at: DateTime<Utc>,
) -> Result<Option<f64>, CoreError> {
    Ok(project_field(field, payload, fetched_at)?.and_then(|v| v.as_f64()))
}
