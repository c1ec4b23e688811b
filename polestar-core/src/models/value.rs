//! Projected telemetry values.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::endpoint::EndpointId;
use super::field::Field;

// ============================================================================
// Telemetry Value
// ============================================================================

/// A typed telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    /// True/false flag.
    Bool(bool),
    /// Whole number.
    Integer(i64),
    /// Decimal number.
    Float(f64),
    /// Point in time.
    Timestamp(DateTime<Utc>),
    /// Calendar date.
    Date(NaiveDate),
    /// Free text or a normalised status name.
    Text(String),
}

impl TelemetryValue {
    /// Returns the value as a float if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text content, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Date(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

// ============================================================================
// Field Value
// ============================================================================

/// The current value of one field, as handed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    /// Which field this is.
    pub field: Field,
    /// The reading. `None` means unavailable.
    pub value: Option<TelemetryValue>,
    /// When the payload carrying this value was fetched.
    pub last_updated: DateTime<Utc>,
    /// Endpoint the value was projected from.
    pub source_endpoint: EndpointId,
    /// Whether the payload was past its TTL when read.
    #[serde(default)]
    pub stale: bool,
}

impl FieldValue {
    /// Returns true if the field has a value.
    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }

    /// Formats the value with its unit, or `unavailable`.
    pub fn display_value(&self) -> String {
        match (&self.value, self.field.unit()) {
            (Some(v), Some(unit)) => format!("{v} {unit}"),
            (Some(v), None) => v.to_string(),
            (None, _) => "unavailable".to_string(),
        }
    }
}

// ============================================================================
// Vendor Enumerations
// ============================================================================

/// Charging state reported by the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChargingStatus {
    /// Actively charging.
    Charging,
    /// Charge complete.
    Done,
    /// Not charging.
    Idle,
    /// Charger fault.
    Fault,
    /// Status not reported or unknown code.
    Unspecified,
    /// Waiting for a scheduled start.
    Scheduled,
    /// Feeding power back.
    Discharging,
    /// Charging error.
    Error,
    /// Smart charging in control.
    SmartCharging,
}

impl ChargingStatus {
    /// Parses a vendor code such as `CHARGING_STATUS_CHARGING`.
    pub fn from_code(code: &str) -> Self {
        match code.trim_start_matches("CHARGING_STATUS_") {
            "CHARGING" => Self::Charging,
            "DONE" => Self::Done,
            "IDLE" => Self::Idle,
            "FAULT" => Self::Fault,
            "SCHEDULED" => Self::Scheduled,
            "DISCHARGING" => Self::Discharging,
            "ERROR" => Self::Error,
            "SMART_CHARGING" => Self::SmartCharging,
            _ => Self::Unspecified,
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Charging => "Charging",
            Self::Done => "Done",
            Self::Idle => "Idle",
            Self::Fault => "Fault",
            Self::Unspecified => "Unspecified",
            Self::Scheduled => "Scheduled",
            Self::Discharging => "Discharging",
            Self::Error => "Error",
            Self::SmartCharging => "Smart Charging",
        }
    }
}

/// Whether a charger is plugged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChargerConnectionStatus {
    /// Cable connected.
    Connected,
    /// Cable not connected.
    Disconnected,
    /// Connection fault.
    Fault,
    /// Status not reported or unknown code.
    Unspecified,
}

impl ChargerConnectionStatus {
    /// Parses a vendor code such as `CHARGER_CONNECTION_STATUS_CONNECTED`.
    pub fn from_code(code: &str) -> Self {
        match code.trim_start_matches("CHARGER_CONNECTION_STATUS_") {
            "CONNECTED" => Self::Connected,
            "DISCONNECTED" => Self::Disconnected,
            "FAULT" => Self::Fault,
            _ => Self::Unspecified,
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::Fault => "Fault",
            Self::Unspecified => "Unspecified",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charging_status_codes() {
        assert_eq!(
            ChargingStatus::from_code("CHARGING_STATUS_CHARGING"),
            ChargingStatus::Charging
        );
        assert_eq!(
            ChargingStatus::from_code("CHARGING_STATUS_SMART_CHARGING").display_name(),
            "Smart Charging"
        );
        assert_eq!(
            ChargingStatus::from_code("CHARGING_STATUS_WHATEVER"),
            ChargingStatus::Unspecified
        );
    }

    #[test]
    fn test_connection_status_codes() {
        assert_eq!(
            ChargerConnectionStatus::from_code("CHARGER_CONNECTION_STATUS_CONNECTED"),
            ChargerConnectionStatus::Connected
        );
        assert_eq!(
            ChargerConnectionStatus::from_code(""),
            ChargerConnectionStatus::Unspecified
        );
    }

    #[test]
    fn test_display_value_with_unit() {
        let value = FieldValue {
            field: Field::BatteryLevel,
            value: Some(TelemetryValue::Integer(80)),
            last_updated: Utc::now(),
            source_endpoint: EndpointId::Battery,
            stale: false,
        };
        assert_eq!(value.display_value(), "80 %");
    }

    #[test]
    fn test_unavailable_display() {
        let value = FieldValue {
            field: Field::Latitude,
            value: None,
            last_updated: Utc::now(),
            source_endpoint: EndpointId::Location,
            stale: true,
        };
        assert!(!value.is_available());
        assert_eq!(value.display_value(), "unavailable");
    }
}
