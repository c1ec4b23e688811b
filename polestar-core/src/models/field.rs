//! The fixed set of telemetry fields exposed to consumers.
//!
//! Each [`Field`] knows which endpoint produces it, where its value lives in
//! that endpoint's payload, and how the raw value should be typed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::endpoint::EndpointId;
use crate::error::CoreError;

// ============================================================================
// Value Kind
// ============================================================================

/// How a raw payload value is typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Free text.
    Text,
    /// Whole number.
    Integer,
    /// Decimal number. Strings such as `"78 kWh"` yield their leading number.
    Float,
    /// True/false flag.
    Boolean,
    /// Calendar date (`YYYY-MM-DD`).
    Date,
    /// RFC 3339 timestamp.
    Timestamp,
    /// Vendor charging status code.
    ChargingStatus,
    /// Vendor charger connection code.
    ChargerConnection,
}

/// Where a field's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Slash-separated path inside the endpoint payload.
    Path(&'static str),
    /// Computed from other fields of the same payload.
    Derived,
}

// ============================================================================
// Field
// ============================================================================

/// A telemetry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    // Vehicle information
    /// Vehicle identification number.
    Vin,
    /// Vendor-internal vehicle id.
    InternalVehicleId,
    /// Licence plate.
    RegistrationNumber,
    /// First registration date.
    RegistrationDate,
    /// Factory completion date.
    FactoryCompleteDate,
    /// Model name, e.g. "Polestar 2".
    ModelName,
    /// Studio image of the configured car.
    ImageUrl,
    /// Nominal battery capacity.
    BatteryCapacity,
    /// Maximum torque.
    Torque,
    /// Installed software version.
    SoftwareVersion,
    /// Release timestamp of the installed software.
    SoftwareVersionRelease,

    // Odometer
    /// Total distance in meters.
    Odometer,
    /// Average speed.
    AverageSpeed,
    /// Automatic trip meter.
    TripMeterAutomatic,
    /// Manual trip meter.
    TripMeterManual,
    /// When the vehicle reported odometer data.
    LastUpdatedOdometerData,

    // Battery
    /// State of charge.
    BatteryLevel,
    /// Charging status.
    ChargingStatus,
    /// Charger connection status.
    ChargerConnectionStatus,
    /// Charging power.
    ChargingPower,
    /// Charging current.
    ChargingCurrent,
    /// Estimated remaining range.
    EstimatedRange,
    /// Average energy consumption.
    AverageEnergyConsumption,
    /// Minutes until the battery is full.
    EstimatedChargingTimeToFull,
    /// Minutes until the target distance is reached.
    EstimatedChargingTimeToTargetDistance,
    /// Range at 100% charge, extrapolated from current range and level.
    EstimatedFullChargeRange,
    /// Wall-clock time at which charging completes.
    EstimatedFullyChargedTime,
    /// When the vehicle reported battery data.
    LastUpdatedBatteryData,

    // Location
    /// Latitude in degrees.
    Latitude,
    /// Longitude in degrees.
    Longitude,
    /// Heading in degrees.
    Heading,
    /// When the vehicle reported its position.
    LastUpdatedLocation,

    // Climate
    /// Cabin temperature.
    InteriorTemperature,
    /// Outside temperature.
    ExteriorTemperature,
    /// Whether climatisation is running.
    ClimateActive,
    /// When the vehicle reported climate data.
    LastUpdatedClimate,
}

impl Field {
    /// Returns all fields in catalog order.
    pub fn all() -> &'static [Field] {
        &[
            Self::Vin,
            Self::InternalVehicleId,
            Self::RegistrationNumber,
            Self::RegistrationDate,
            Self::FactoryCompleteDate,
            Self::ModelName,
            Self::ImageUrl,
            Self::BatteryCapacity,
            Self::Torque,
            Self::SoftwareVersion,
            Self::SoftwareVersionRelease,
            Self::Odometer,
            Self::AverageSpeed,
            Self::TripMeterAutomatic,
            Self::TripMeterManual,
            Self::LastUpdatedOdometerData,
            Self::BatteryLevel,
            Self::ChargingStatus,
            Self::ChargerConnectionStatus,
            Self::ChargingPower,
            Self::ChargingCurrent,
            Self::EstimatedRange,
            Self::AverageEnergyConsumption,
            Self::EstimatedChargingTimeToFull,
            Self::EstimatedChargingTimeToTargetDistance,
            Self::EstimatedFullChargeRange,
            Self::EstimatedFullyChargedTime,
            Self::LastUpdatedBatteryData,
            Self::Latitude,
            Self::Longitude,
            Self::Heading,
            Self::LastUpdatedLocation,
            Self::InteriorTemperature,
            Self::ExteriorTemperature,
            Self::ClimateActive,
            Self::LastUpdatedClimate,
        ]
    }

    /// Returns the snake_case field name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vin => "vin",
            Self::InternalVehicleId => "internal_vehicle_id",
            Self::RegistrationNumber => "registration_number",
            Self::RegistrationDate => "registration_date",
            Self::FactoryCompleteDate => "factory_complete_date",
            Self::ModelName => "model_name",
            Self::ImageUrl => "image_url",
            Self::BatteryCapacity => "battery_capacity",
            Self::Torque => "torque",
            Self::SoftwareVersion => "software_version",
            Self::SoftwareVersionRelease => "software_version_release",
            Self::Odometer => "odometer",
            Self::AverageSpeed => "average_speed",
            Self::TripMeterAutomatic => "trip_meter_automatic",
            Self::TripMeterManual => "trip_meter_manual",
            Self::LastUpdatedOdometerData => "last_updated_odometer_data",
            Self::BatteryLevel => "battery_level",
            Self::ChargingStatus => "charging_status",
            Self::ChargerConnectionStatus => "charger_connection_status",
            Self::ChargingPower => "charging_power",
            Self::ChargingCurrent => "charging_current",
            Self::EstimatedRange => "estimated_range",
            Self::AverageEnergyConsumption => "average_energy_consumption",
            Self::EstimatedChargingTimeToFull => "estimated_charging_time_to_full",
            Self::EstimatedChargingTimeToTargetDistance => {
                "estimated_charging_time_to_target_distance"
            }
            Self::EstimatedFullChargeRange => "estimated_full_charge_range",
            Self::EstimatedFullyChargedTime => "estimated_fully_charged_time",
            Self::LastUpdatedBatteryData => "last_updated_battery_data",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Heading => "heading",
            Self::LastUpdatedLocation => "last_updated_location",
            Self::InteriorTemperature => "interior_temperature",
            Self::ExteriorTemperature => "exterior_temperature",
            Self::ClimateActive => "climate_active",
            Self::LastUpdatedClimate => "last_updated_climate",
        }
    }

    /// The endpoint whose payload carries this field.
    pub fn endpoint(&self) -> EndpointId {
        match self {
            Self::Vin
            | Self::InternalVehicleId
            | Self::RegistrationNumber
            | Self::RegistrationDate
            | Self::FactoryCompleteDate
            | Self::ModelName
            | Self::ImageUrl
            | Self::BatteryCapacity
            | Self::Torque
            | Self::SoftwareVersion
            | Self::SoftwareVersionRelease => EndpointId::VehicleInformation,
            Self::Odometer
            | Self::AverageSpeed
            | Self::TripMeterAutomatic
            | Self::TripMeterManual
            | Self::LastUpdatedOdometerData => EndpointId::Odometer,
            Self::BatteryLevel
            | Self::ChargingStatus
            | Self::ChargerConnectionStatus
            | Self::ChargingPower
            | Self::ChargingCurrent
            | Self::EstimatedRange
            | Self::AverageEnergyConsumption
            | Self::EstimatedChargingTimeToFull
            | Self::EstimatedChargingTimeToTargetDistance
            | Self::EstimatedFullChargeRange
            | Self::EstimatedFullyChargedTime
            | Self::LastUpdatedBatteryData => EndpointId::Battery,
            Self::Latitude | Self::Longitude | Self::Heading | Self::LastUpdatedLocation => {
                EndpointId::Location
            }
            Self::InteriorTemperature
            | Self::ExteriorTemperature
            | Self::ClimateActive
            | Self::LastUpdatedClimate => EndpointId::Climate,
        }
    }

    /// Where the value lives in the endpoint payload.
    pub fn source(&self) -> FieldSource {
        FieldSource::Path(match self {
            Self::Vin => "vin",
            Self::InternalVehicleId => "internalVehicleIdentifier",
            Self::RegistrationNumber => "registrationNo",
            Self::RegistrationDate => "registrationDate",
            Self::FactoryCompleteDate => "factoryCompleteDate",
            Self::ModelName => "content/model/name",
            Self::ImageUrl => "content/images/studio/url",
            Self::BatteryCapacity => "content/specification/battery",
            Self::Torque => "content/specification/torque",
            Self::SoftwareVersion => "software/version",
            Self::SoftwareVersionRelease => "software/versionTimestamp",
            Self::Odometer => "odometerMeters",
            Self::AverageSpeed => "averageSpeedKmPerHour",
            Self::TripMeterAutomatic => "tripMeterAutomaticKm",
            Self::TripMeterManual => "tripMeterManualKm",
            Self::BatteryLevel => "batteryChargeLevelPercentage",
            Self::ChargingStatus => "chargingStatus",
            Self::ChargerConnectionStatus => "chargerConnectionStatus",
            Self::ChargingPower => "chargingPowerWatts",
            Self::ChargingCurrent => "chargingCurrentAmps",
            Self::EstimatedRange => "estimatedDistanceToEmptyKm",
            Self::AverageEnergyConsumption => "averageEnergyConsumptionKwhPer100Km",
            Self::EstimatedChargingTimeToFull => "estimatedChargingTimeToFullMinutes",
            Self::EstimatedChargingTimeToTargetDistance => {
                "estimatedChargingTimeMinutesToTargetDistance"
            }
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Heading => "heading",
            Self::InteriorTemperature => "interiorTemperatureCelsius",
            Self::ExteriorTemperature => "exteriorTemperatureCelsius",
            Self::ClimateActive => "climatizationActive",
            Self::LastUpdatedOdometerData
            | Self::LastUpdatedBatteryData
            | Self::LastUpdatedLocation
            | Self::LastUpdatedClimate => "eventUpdatedTimestamp/iso",
            Self::EstimatedFullChargeRange | Self::EstimatedFullyChargedTime => {
                return FieldSource::Derived;
            }
        })
    }

    /// How the raw value is typed.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Vin
            | Self::InternalVehicleId
            | Self::RegistrationNumber
            | Self::ModelName
            | Self::ImageUrl
            | Self::SoftwareVersion => ValueKind::Text,
            Self::RegistrationDate | Self::FactoryCompleteDate => ValueKind::Date,
            Self::SoftwareVersionRelease
            | Self::LastUpdatedOdometerData
            | Self::LastUpdatedBatteryData
            | Self::LastUpdatedLocation
            | Self::LastUpdatedClimate
            | Self::EstimatedFullyChargedTime => ValueKind::Timestamp,
            Self::Odometer
            | Self::BatteryLevel
            | Self::ChargingPower
            | Self::ChargingCurrent
            | Self::EstimatedRange
            | Self::EstimatedChargingTimeToFull
            | Self::EstimatedChargingTimeToTargetDistance
            | Self::EstimatedFullChargeRange => ValueKind::Integer,
            Self::BatteryCapacity
            | Self::Torque
            | Self::AverageSpeed
            | Self::TripMeterAutomatic
            | Self::TripMeterManual
            | Self::AverageEnergyConsumption
            | Self::Latitude
            | Self::Longitude
            | Self::Heading
            | Self::InteriorTemperature
            | Self::ExteriorTemperature => ValueKind::Float,
            Self::ClimateActive => ValueKind::Boolean,
            Self::ChargingStatus => ValueKind::ChargingStatus,
            Self::ChargerConnectionStatus => ValueKind::ChargerConnection,
        }
    }

    /// Unit of measurement, if any.
    pub fn unit(&self) -> Option<&'static str> {
        match self {
            Self::Odometer => Some("m"),
            Self::TripMeterAutomatic
            | Self::TripMeterManual
            | Self::EstimatedRange
            | Self::EstimatedFullChargeRange => Some("km"),
            Self::AverageSpeed => Some("km/h"),
            Self::BatteryLevel => Some("%"),
            Self::ChargingPower => Some("W"),
            Self::ChargingCurrent => Some("A"),
            Self::AverageEnergyConsumption => Some("kWh/100km"),
            Self::EstimatedChargingTimeToFull | Self::EstimatedChargingTimeToTargetDistance => {
                Some("min")
            }
            Self::BatteryCapacity => Some("kWh"),
            Self::Torque => Some("Nm"),
            Self::Latitude | Self::Longitude | Self::Heading => Some("°"),
            Self::InteriorTemperature | Self::ExteriorTemperature => Some("°C"),
            _ => None,
        }
    }

    /// Fields the vendor omits while idle; these read as zero instead of
    /// unavailable.
    pub fn zero_when_missing(&self) -> bool {
        matches!(self, Self::ChargingPower | Self::ChargingCurrent)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| CoreError::UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrips_through_from_str() {
        for field in Field::all() {
            assert_eq!(field.name().parse::<Field>().unwrap(), *field);
        }
    }

    #[test]
    fn test_serde_name_matches_display() {
        for field in Field::all() {
            let json = serde_json::to_string(field).unwrap();
            assert_eq!(json, format!("\"{field}\""));
        }
    }

    #[test]
    fn test_derived_fields_have_no_path() {
        assert_eq!(Field::EstimatedFullChargeRange.source(), FieldSource::Derived);
        assert_eq!(Field::EstimatedFullyChargedTime.source(), FieldSource::Derived);
        assert_eq!(
            Field::ModelName.source(),
            FieldSource::Path("content/model/name")
        );
    }

    #[test]
    fn test_spec_field_names_present() {
        for name in ["battery_level", "odometer", "latitude", "longitude", "charging_status"] {
            assert!(name.parse::<Field>().is_ok(), "{name} missing");
        }
    }

    #[test]
    fn test_zero_when_missing_only_for_charging_flow() {
        let zeroed: Vec<_> = Field::all()
            .iter()
            .filter(|f| f.zero_when_missing())
            .collect();
        assert_eq!(zeroed, vec![&Field::ChargingPower, &Field::ChargingCurrent]);
    }
}
