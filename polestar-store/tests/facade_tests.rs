//! End-to-end behaviour of the vehicle data facade over a scripted transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use polestar_core::{
    ChargingStatus, Credentials, EndpointId, Field, FieldValue, ManualClock,
    TelemetryValue,
};
use polestar_fetch::testing::{MockTransport, graphql_data};
use polestar_fetch::{HttpResponse, RetryStrategy, TransportError};
use polestar_store::{DataError, Settings, VehicleDataFacade};
use serde_json::json;

const VIN: &str = "YSMYKEAE1RB000123";

struct Fixture {
    facade: VehicleDataFacade,
    transport: Arc<MockTransport>,
    clock: ManualClock,
}

fn fixture(limit: u32) -> Fixture {
    let clock = ManualClock::new(Utc::now());
    let transport = Arc::new(MockTransport::new());
    transport.script_login("access-1", 3600);

    let facade = VehicleDataFacade::builder(Credentials::new(
        "driver@example.com",
        "secret",
        "app-key",
        VIN,
    ))
    .transport(transport.clone())
    .clock(Arc::new(clock.clone()))
    .budget(limit, chrono::Duration::hours(24))
    .retry(RetryStrategy::new(2).with_base_delay(Duration::ZERO))
    .build()
    .unwrap();

    Fixture {
        facade,
        transport,
        clock,
    }
}

fn battery(level: i64, status: &str) -> HttpResponse {
    graphql_data(
        "getBatteryData",
        json!({
            "batteryChargeLevelPercentage": level,
            "chargingStatus": status,
            "estimatedDistanceToEmptyKm": 250,
            "estimatedChargingTimeToFullMinutes": 90,
        }),
    )
}

fn odometer(meters: i64) -> HttpResponse {
    graphql_data("getOdometerData", json!({ "odometerMeters": meters }))
}

fn script_all(transport: &MockTransport) {
    transport
        .always(
            "GetConsumerCarsV2",
            graphql_data(
                "getConsumerCarsV2",
                json!([{ "vin": VIN, "content": { "model": { "name": "Polestar 2" } } }]),
            ),
        )
        .always("GetBatteryData", battery(80, "CHARGING_STATUS_IDLE"))
        .always("GetOdometerData", odometer(1_000_000))
        .always(
            "GetLastKnownLocation",
            graphql_data("getLastKnownLocation", json!({ "latitude": 57.7, "longitude": 11.9 })),
        )
        .always(
            "GetClimateData",
            graphql_data("getClimateData", json!({ "interiorTemperatureCelsius": 21.5 })),
        );
}

#[tokio::test]
async fn concurrent_gets_share_one_call() {
    let f = fixture(100);
    f.transport.push("GetBatteryData", battery(64, "CHARGING_STATUS_CHARGING"));
    f.transport.set_latency(Duration::from_millis(25));

    let (level, status, range) = tokio::join!(
        f.facade.get(Field::BatteryLevel),
        f.facade.get(Field::ChargingStatus),
        f.facade.get_by_name("estimated_range"),
    );

    assert_eq!(level.unwrap().value, Some(TelemetryValue::Integer(64)));
    assert_eq!(
        status.unwrap().value,
        Some(TelemetryValue::Text(ChargingStatus::Charging.display_name().to_string()))
    );
    assert_eq!(range.unwrap().value, Some(TelemetryValue::Integer(250)));
    assert_eq!(f.transport.call_count("GetBatteryData"), 1);
}

#[tokio::test]
async fn cached_value_served_until_ttl_elapses() {
    let f = fixture(100);
    f.transport
        .push("GetOdometerData", odometer(1_000_000))
        .push("GetOdometerData", odometer(1_001_000));

    let first = f.facade.get(Field::Odometer).await.unwrap();
    f.clock.advance(chrono::Duration::seconds(29));
    let second = f.facade.get(Field::Odometer).await.unwrap();
    assert_eq!(first.value, second.value);
    assert_eq!(f.transport.call_count("GetOdometerData"), 1);

    f.clock.advance(chrono::Duration::seconds(1));
    let third = f.facade.get(Field::Odometer).await.unwrap();
    assert_ne!(third.value, first.value);
    assert_eq!(f.transport.call_count("GetOdometerData"), 2);
}

#[tokio::test]
async fn unknown_field_name_is_rejected() {
    let f = fixture(100);
    let err = f.facade.get_by_name("warp_drive_charge").await.unwrap_err();
    assert!(matches!(err, DataError::UnknownField(_)));
    assert!(err.is_fatal());
    assert_eq!(f.transport.total_calls(), 0);
}

#[tokio::test]
async fn missing_value_is_unavailable_not_zero() {
    let f = fixture(100);
    f.transport.push("GetBatteryData", battery(50, "CHARGING_STATUS_IDLE"));

    let consumption = f.facade.get(Field::AverageEnergyConsumption).await.unwrap();
    assert!(!consumption.is_available());
    assert_eq!(consumption.display_value(), "unavailable");

    // The vendor omits charging power while idle; it reads as zero.
    let power = f.facade.get(Field::ChargingPower).await.unwrap();
    assert_eq!(power.value, Some(TelemetryValue::Integer(0)));
}

#[tokio::test]
async fn stale_value_survives_outage() {
    let f = fixture(100);
    f.transport.push("GetBatteryData", battery(77, "CHARGING_STATUS_IDLE"));
    f.facade.get(Field::BatteryLevel).await.unwrap();

    f.clock.advance(chrono::Duration::minutes(5));
    f.transport.always_error(
        "GetBatteryData",
        TransportError::Timeout(Duration::from_secs(30)),
    );

    let value = f.facade.get(Field::BatteryLevel).await.unwrap();
    assert_eq!(value.value, Some(TelemetryValue::Integer(77)));
    assert!(value.stale);
    assert!(f.facade.last_error(Field::BatteryLevel).is_some());
    assert!(f.facade.last_error(Field::Odometer).is_none());
}

#[tokio::test]
async fn outage_without_cache_is_fetch_error() {
    let f = fixture(100);
    f.transport
        .always_error("GetClimateData", TransportError::Network("unreachable".into()));

    let err = f.facade.get(Field::InteriorTemperature).await.unwrap_err();
    assert!(matches!(err, DataError::Fetch(_)));
    assert_eq!(f.transport.call_count("GetClimateData"), 3);
}

#[tokio::test]
async fn subscriber_called_once_per_change() {
    let f = fixture(100);
    f.transport
        .push("GetBatteryData", battery(60, "CHARGING_STATUS_IDLE"))
        .push("GetOdometerData", odometer(5_000));
    f.facade.get(Field::BatteryLevel).await.unwrap();
    f.facade.get(Field::Odometer).await.unwrap();

    let seen: Arc<Mutex<Vec<FieldValue>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    f.facade
        .subscribe(Field::BatteryLevel, move |value| {
            sink.lock().unwrap().push(value.clone());
        })
        .unwrap();

    let unrelated = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&unrelated);
    f.facade
        .subscribe(Field::Odometer, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    // Battery changes, odometer repeats its payload.
    f.clock.advance(chrono::Duration::seconds(31));
    script_all(&f.transport);
    f.transport.push("GetBatteryData", battery(61, "CHARGING_STATUS_IDLE"));
    f.transport.push("GetOdometerData", odometer(5_000));

    let report = f.facade.refresh_all().await;
    assert!(report.is_complete(), "{report:?}");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].value, Some(TelemetryValue::Integer(61)));
    assert_eq!(unrelated.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsubscribe_stops_notifications() {
    let f = fixture(100);
    f.transport.push("GetBatteryData", battery(10, "CHARGING_STATUS_IDLE"));

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let id = f
        .facade
        .subscribe(Field::BatteryLevel, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert!(f.facade.unsubscribe(id));
    assert!(!f.facade.unsubscribe(id));

    f.facade.get(Field::BatteryLevel).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refresh_all_skips_fresh_endpoints() {
    let f = fixture(100);
    script_all(&f.transport);

    let first = f.facade.refresh_all().await;
    assert_eq!(first.fresh.len(), EndpointId::all().len());
    let calls = f.transport.total_calls();

    let second = f.facade.refresh_all().await;
    assert!(second.is_complete());
    assert_eq!(f.transport.total_calls(), calls);
    assert_eq!(f.facade.remaining_budget(), 100 - 5);
}

#[tokio::test]
async fn diagnostics_report_connection() {
    let f = fixture(100);
    script_all(&f.transport);
    f.facade.refresh_all().await;

    let diag = f.facade.diagnostics();
    assert!(diag.api_connected());
    assert_eq!(diag.budget.remaining, 95);
    assert!(diag.endpoints.values().all(|s| s.fresh && s.calls == 1));
    assert!(diag.last_success().is_some());

    let json = serde_json::to_value(&diag).unwrap();
    assert_eq!(json["endpoints"]["battery"]["last_status"], 200);
}

#[tokio::test]
async fn invalid_credentials_latch() {
    let clock = ManualClock::new(Utc::now());
    let transport = Arc::new(MockTransport::new());
    transport
        .push(
            polestar_fetch::testing::AUTHORIZE,
            polestar_fetch::testing::redirect("/as/authorization.oauth2?resumePath=abc123"),
        )
        .push(polestar_fetch::testing::RESUME, HttpResponse::new(200, "<form>"));

    let facade = VehicleDataFacade::builder(Credentials::new("a@b.c", "wrong", "app-key", VIN))
        .transport(transport.clone())
        .clock(Arc::new(clock))
        .build()
        .unwrap();

    let err = facade.get(Field::BatteryLevel).await.unwrap_err();
    assert!(err.is_fatal());
    let calls = transport.total_calls();

    let again = facade.get(Field::Latitude).await.unwrap_err();
    assert!(again.is_fatal());
    assert_eq!(transport.total_calls(), calls);
    assert!(facade.diagnostics().credentials_rejected);
}

#[tokio::test]
async fn builder_applies_settings() {
    let mut settings = Settings {
        email: "driver@example.com".into(),
        vehicle_identifier: VIN.into(),
        application_key: "app-key".into(),
        daily_request_limit: 42,
        ..Settings::default()
    };
    settings.ttl_overrides.insert(EndpointId::Battery, 120);

    let facade = VehicleDataFacade::builder(settings.credentials("secret"))
        .settings(&settings)
        .unwrap()
        .transport(Arc::new(MockTransport::new()))
        .build()
        .unwrap();

    assert_eq!(facade.remaining_budget(), 42);
    assert_eq!(facade.vehicle_identifier(), VIN);
    assert_eq!(
        facade.catalog().get(EndpointId::Battery).unwrap().ttl,
        chrono::Duration::seconds(120)
    );
    assert_eq!(facade.catalog(), &settings.catalog());
}
