//! GraphQL request building and response parsing for the vendor API.
//!
//! The API is GraphQL over `GET`: the query, operation name, and JSON
//! variables travel as query parameters.

use std::time::Duration;

use polestar_core::EndpointId;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::error::{AuthError, FetchError};
use crate::transport::HttpRequest;

/// OAuth redirect URI registered for the application key.
pub const REDIRECT_URI: &str = "https://www.polestar.com/sign-in-callback";

/// GraphQL error message the API uses for an expired or unknown token.
const NOT_AUTHENTICATED: &str = "User not authenticated";

/// Longest body excerpt kept in error messages.
const MAX_ERROR_BODY: usize = 200;

const GET_AUTH_TOKEN: &str = "query getAuthToken($code: String!) { getAuthToken(code: $code) { id_token access_token refresh_token expires_in }}";

const REFRESH_AUTH_TOKEN: &str = "query refreshAuthToken($token: String!) { refreshAuthToken(token: $token) { id_token access_token refresh_token expires_in }}";

const GET_CONSUMER_CARS: &str = "query GetConsumerCarsV2 { getConsumerCarsV2 { vin internalVehicleIdentifier registrationNo registrationDate factoryCompleteDate content { model { name code } images { studio { url } } specification { battery torque } } software { version versionTimestamp } } }";

const GET_ODOMETER_DATA: &str = "query GetOdometerData($vin:String!){getOdometerData(vin:$vin){averageSpeedKmPerHour eventUpdatedTimestamp{iso unix}odometerMeters tripMeterAutomaticKm tripMeterManualKm}}";

const GET_BATTERY_DATA: &str = "query GetBatteryData($vin:String!){getBatteryData(vin:$vin){averageEnergyConsumptionKwhPer100Km batteryChargeLevelPercentage chargerConnectionStatus chargingCurrentAmps chargingPowerWatts chargingStatus estimatedChargingTimeMinutesToTargetDistance estimatedChargingTimeToFullMinutes estimatedDistanceToEmptyKm eventUpdatedTimestamp{iso unix}}}";

const GET_LAST_KNOWN_LOCATION: &str = "query GetLastKnownLocation($vin:String!){getLastKnownLocation(vin:$vin){latitude longitude heading eventUpdatedTimestamp{iso unix}}}";

const GET_CLIMATE_DATA: &str = "query GetClimateData($vin:String!){getClimateData(vin:$vin){interiorTemperatureCelsius exteriorTemperatureCelsius climatizationActive eventUpdatedTimestamp{iso unix}}}";

// ============================================================================
// API URLs
// ============================================================================

/// Base URLs of the identity provider and the API gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiUrls {
    oidc_base: String,
    api_base: String,
}

impl ApiUrls {
    /// Default identity provider.
    pub const DEFAULT_OIDC_BASE: &'static str = "https://polestarid.eu.polestar.com/";
    /// Default API gateway.
    pub const DEFAULT_API_BASE: &'static str = "https://pc-api.polestar.com/eu-north-1/";

    /// Validates and stores custom base URLs.
    pub fn new(oidc_base: &str, api_base: &str) -> Result<Self, url::ParseError> {
        let urls = Self {
            oidc_base: with_trailing_slash(oidc_base),
            api_base: with_trailing_slash(api_base),
        };
        Url::parse(&urls.oidc_base)?;
        Url::parse(&urls.api_base)?;
        Ok(urls)
    }

    /// Authorization endpoint that starts the login.
    pub fn authorization_url(&self) -> Result<Url, url::ParseError> {
        self.oidc_base()?.join("as/authorization.oauth2")
    }

    /// Credential submission endpoint for a login session.
    pub fn resume_url(&self, resume_path: &str) -> Result<Url, url::ParseError> {
        let resume_path = resume_path.trim_matches('/');
        let resume_path = resume_path.strip_prefix("as/").unwrap_or(resume_path);
        self.oidc_base()?
            .join(&format!("as/{resume_path}/resume/as/authorization.ping"))
    }

    /// Token exchange endpoint.
    pub fn auth_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.api_base)?.join("auth/")
    }

    /// Data endpoint serving `endpoint`.
    pub fn data_url(&self, endpoint: EndpointId) -> Result<Url, url::ParseError> {
        let base = Url::parse(&self.api_base)?;
        match endpoint {
            EndpointId::VehicleInformation => base.join("my-star/"),
            _ => base.join("mystar-v2/"),
        }
    }

    /// Identity provider base, for resolving relative redirects.
    pub fn oidc_base(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.oidc_base)
    }
}

impl Default for ApiUrls {
    fn default() -> Self {
        Self {
            oidc_base: Self::DEFAULT_OIDC_BASE.to_string(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
        }
    }
}

fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

// ============================================================================
// Data Calls
// ============================================================================

fn query_for(endpoint: EndpointId) -> &'static str {
    match endpoint {
        EndpointId::VehicleInformation => GET_CONSUMER_CARS,
        EndpointId::Odometer => GET_ODOMETER_DATA,
        EndpointId::Battery => GET_BATTERY_DATA,
        EndpointId::Location => GET_LAST_KNOWN_LOCATION,
        EndpointId::Climate => GET_CLIMATE_DATA,
    }
}

/// Key under `data` that holds an operation's result.
pub fn response_key(endpoint: EndpointId) -> &'static str {
    match endpoint {
        EndpointId::VehicleInformation => "getConsumerCarsV2",
        EndpointId::Odometer => "getOdometerData",
        EndpointId::Battery => "getBatteryData",
        EndpointId::Location => "getLastKnownLocation",
        EndpointId::Climate => "getClimateData",
    }
}

fn variables_for(endpoint: EndpointId, vin: &str) -> Value {
    match endpoint {
        EndpointId::VehicleInformation => json!({ "locale": "en_GB" }),
        _ => json!({ "vin": vin }),
    }
}

/// Builds the GraphQL request for one endpoint.
pub fn data_request(
    urls: &ApiUrls,
    endpoint: EndpointId,
    vin: &str,
    bearer: &str,
    timeout: Duration,
) -> Result<HttpRequest, FetchError> {
    let url = urls
        .data_url(endpoint)
        .map_err(|e| FetchError::InvalidResponse(format!("bad data URL: {e}")))?;
    let variables = variables_for(endpoint, vin).to_string();

    Ok(HttpRequest::get(url)
        .query(&[
            ("query", query_for(endpoint)),
            ("operationName", endpoint.operation()),
            ("variables", variables.as_str()),
        ])
        .header("Content-Type", "application/json")
        .header("Authorization", bearer)
        .timeout(timeout))
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQlErrorMessage>>,
}

impl GraphQlResponse {
    fn first_error(&self) -> Option<&str> {
        self.errors
            .as_deref()
            .and_then(<[GraphQlErrorMessage]>::first)
            .map(|e| e.message.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

fn excerpt(text: &str) -> String {
    text.chars().take(MAX_ERROR_BODY).collect()
}

/// Parses a data call response into the endpoint payload.
///
/// For vehicle information the payload is the car whose VIN matches `vin`.
pub fn parse_data_response(
    endpoint: EndpointId,
    response: &crate::transport::HttpResponse,
    vin: &str,
) -> Result<Value, FetchError> {
    match response.status {
        401 => return Err(FetchError::Unauthorized),
        429 => {
            return Err(FetchError::RateLimited {
                retry_after: response.retry_after_secs(),
            });
        }
        status if !response.is_success() => {
            return Err(FetchError::Http {
                status,
                message: excerpt(&response.text()),
            });
        }
        _ => {}
    }

    let parsed: GraphQlResponse = response
        .json()
        .map_err(|e| FetchError::InvalidResponse(format!("not JSON: {e}")))?;

    if let Some(message) = parsed.first_error() {
        if message == NOT_AUTHENTICATED {
            return Err(FetchError::Unauthorized);
        }
        return Err(FetchError::GraphQl(message.to_string()));
    }

    let key = response_key(endpoint);
    let payload = parsed
        .data
        .and_then(|mut data| data.get_mut(key).map(Value::take))
        .filter(|v| !v.is_null())
        .ok_or_else(|| FetchError::InvalidResponse(format!("missing data.{key}")))?;

    if endpoint == EndpointId::VehicleInformation {
        return select_vehicle(payload, vin);
    }
    Ok(payload)
}

fn select_vehicle(cars: Value, vin: &str) -> Result<Value, FetchError> {
    let Value::Array(cars) = cars else {
        return Err(FetchError::InvalidResponse(
            "vehicle list is not an array".to_string(),
        ));
    };

    debug!(count = cars.len(), "Vehicles on account");
    cars.into_iter()
        .find(|car| {
            car.get("vin")
                .and_then(Value::as_str)
                .is_some_and(|v| v.eq_ignore_ascii_case(vin))
        })
        .ok_or_else(|| FetchError::VehicleNotFound(vin.to_string()))
}

// ============================================================================
// Token Exchange
// ============================================================================

/// Token material returned by the auth GraphQL operations.
#[derive(Clone, Deserialize)]
pub struct AuthTokenPayload {
    /// Bearer token.
    pub access_token: String,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// Builds the request exchanging an authorization code for tokens.
pub fn get_token_request(
    urls: &ApiUrls,
    code: &str,
    timeout: Duration,
) -> Result<HttpRequest, AuthError> {
    auth_request(urls, GET_AUTH_TOKEN, "getAuthToken", &json!({ "code": code }), timeout)
}

/// Builds the request renewing tokens with a refresh token.
pub fn refresh_token_request(
    urls: &ApiUrls,
    refresh_token: &str,
    bearer: &str,
    timeout: Duration,
) -> Result<HttpRequest, AuthError> {
    let request = auth_request(
        urls,
        REFRESH_AUTH_TOKEN,
        "refreshAuthToken",
        &json!({ "token": refresh_token }),
        timeout,
    )?;
    Ok(request.header("Authorization", bearer))
}

fn auth_request(
    urls: &ApiUrls,
    query: &str,
    operation: &str,
    variables: &Value,
    timeout: Duration,
) -> Result<HttpRequest, AuthError> {
    let url = urls
        .auth_url()
        .map_err(|e| AuthError::InvalidResponse(format!("bad auth URL: {e}")))?;
    let variables = variables.to_string();

    Ok(HttpRequest::get(url)
        .query(&[
            ("query", query),
            ("operationName", operation),
            ("variables", variables.as_str()),
        ])
        .header("Content-Type", "application/json")
        .timeout(timeout))
}

/// Parses a token exchange response for `operation`.
pub fn parse_token_response(
    operation: &'static str,
    response: &crate::transport::HttpResponse,
) -> Result<AuthTokenPayload, AuthError> {
    if response.is_rate_limited() {
        return Err(AuthError::RateLimited {
            retry_after: response.retry_after_secs(),
        });
    }
    if !response.is_success() {
        return Err(AuthError::UnexpectedStatus {
            step: operation,
            status: response.status,
        });
    }

    let parsed: GraphQlResponse = response
        .json()
        .map_err(|e| AuthError::InvalidResponse(format!("{operation}: not JSON: {e}")))?;
    if let Some(message) = parsed.first_error() {
        return Err(AuthError::InvalidResponse(format!("{operation}: {message}")));
    }

    let payload = parsed
        .data
        .and_then(|mut data| data.get_mut(operation).map(Value::take))
        .filter(|v| !v.is_null())
        .ok_or_else(|| AuthError::InvalidResponse(format!("missing data.{operation}")))?;

    serde_json::from_value(payload)
        .map_err(|e| AuthError::InvalidResponse(format!("{operation}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpResponse;

    #[test]
    fn test_default_urls() {
        let urls = ApiUrls::default();
        assert_eq!(
            urls.data_url(EndpointId::Battery).unwrap().as_str(),
            "https://pc-api.polestar.com/eu-north-1/mystar-v2/"
        );
        assert_eq!(
            urls.data_url(EndpointId::VehicleInformation).unwrap().as_str(),
            "https://pc-api.polestar.com/eu-north-1/my-star/"
        );
        assert_eq!(
            urls.auth_url().unwrap().as_str(),
            "https://pc-api.polestar.com/eu-north-1/auth/"
        );
    }

    #[test]
    fn test_resume_url_normalises_path() {
        let urls = ApiUrls::default();
        let expected = "https://polestarid.eu.polestar.com/as/abc123/resume/as/authorization.ping";
        assert_eq!(urls.resume_url("abc123").unwrap().as_str(), expected);
        assert_eq!(urls.resume_url("/as/abc123").unwrap().as_str(), expected);
    }

    #[test]
    fn test_custom_base_without_slash() {
        let urls = ApiUrls::new("http://127.0.0.1:9000/id", "http://127.0.0.1:9000/api").unwrap();
        assert_eq!(
            urls.auth_url().unwrap().as_str(),
            "http://127.0.0.1:9000/api/auth/"
        );
    }

    #[test]
    fn test_data_request_carries_operation_and_vin() {
        let request = data_request(
            &ApiUrls::default(),
            EndpointId::Odometer,
            "VIN1",
            "Bearer abc",
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(request.query_param("operationName").as_deref(), Some("GetOdometerData"));
        assert_eq!(request.query_param("variables").as_deref(), Some(r#"{"vin":"VIN1"}"#));
        assert_eq!(request.header_value("authorization"), Some("Bearer abc"));
        assert_eq!(request.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_parse_success() {
        let response = HttpResponse::new(
            200,
            r#"{"data":{"getBatteryData":{"batteryChargeLevelPercentage":55}}}"#,
        );
        let payload = parse_data_response(EndpointId::Battery, &response, "VIN1").unwrap();
        assert_eq!(payload["batteryChargeLevelPercentage"], 55);
    }

    #[test]
    fn test_parse_unauthorized_variants() {
        let http = HttpResponse::new(401, "");
        assert_eq!(
            parse_data_response(EndpointId::Battery, &http, "V"),
            Err(FetchError::Unauthorized)
        );

        let gql = HttpResponse::new(200, r#"{"errors":[{"message":"User not authenticated"}]}"#);
        assert_eq!(
            parse_data_response(EndpointId::Battery, &gql, "V"),
            Err(FetchError::Unauthorized)
        );
    }

    #[test]
    fn test_parse_graphql_error() {
        let response = HttpResponse::new(200, r#"{"errors":[{"message":"Internal"}],"data":null}"#);
        assert_eq!(
            parse_data_response(EndpointId::Odometer, &response, "V"),
            Err(FetchError::GraphQl("Internal".into()))
        );
    }

    #[test]
    fn test_parse_server_error() {
        let response = HttpResponse::new(502, "bad gateway");
        let err = parse_data_response(EndpointId::Odometer, &response, "V").unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.status_code(), Some(502));
    }

    #[test]
    fn test_vehicle_selected_by_vin() {
        let response = HttpResponse::new(
            200,
            r#"{"data":{"getConsumerCarsV2":[{"vin":"AAA"},{"vin":"BBB","registrationNo":"XYZ"}]}}"#,
        );
        let car = parse_data_response(EndpointId::VehicleInformation, &response, "bbb").unwrap();
        assert_eq!(car["registrationNo"], "XYZ");

        let missing = parse_data_response(EndpointId::VehicleInformation, &response, "CCC");
        assert_eq!(missing, Err(FetchError::VehicleNotFound("CCC".into())));
    }

    #[test]
    fn test_parse_token_response() {
        let response = HttpResponse::new(
            200,
            r#"{"data":{"getAuthToken":{"id_token":"i","access_token":"a","refresh_token":"r","expires_in":3600}}}"#,
        );
        let token = parse_token_response("getAuthToken", &response).unwrap();
        assert_eq!(token.access_token, "a");
        assert_eq!(token.refresh_token.as_deref(), Some("r"));
        assert_eq!(token.expires_in, 3600);
    }

    #[test]
    fn test_parse_token_error() {
        let response = HttpResponse::new(200, r#"{"errors":[{"message":"invalid code"}]}"#);
        assert!(matches!(
            parse_token_response("getAuthToken", &response),
            Err(AuthError::InvalidResponse(_))
        ));
    }
}
