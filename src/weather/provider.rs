//! Upstream weather client
//!
//! - `WeatherBackend` is the seam the tool handlers call; it is object-safe
//!   and mocked in dispatcher tests
//! - `OpenMeteoClient` implements it against the Open-Meteo forecast and
//!   geocoding APIs
//! - response decoding is split into plain mapping functions so it can be
//!   tested with canned JSON, no HTTP involved

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[cfg(test)]
use mockall::automock;

use super::types::{Coordinates, CurrentConditions, ForecastDay, GeoCandidate};
use crate::config::WeatherConfig;
use crate::error::AppResult;
use crate::gateway::errors::GatewayError;

/// Fields requested from the forecast API's `current` block
const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m,wind_direction_10m,pressure_msl";

/// Fields requested from the forecast API's `daily` block
const DAILY_FIELDS: &str =
    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_sum,relative_humidity_2m_max";

/// Candidates requested per geocoding query
const GEOCODE_LIMIT: u8 = 5;

/// Hard upstream limit on forecast length
const OPEN_METEO_MAX_DAYS: u8 = 16;

/// Failures at the upstream seam
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure, including timeouts
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Non-success HTTP status other than 429
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    /// HTTP 429 from the provider
    #[error("upstream rate limit exceeded")]
    RateLimited,
    /// Body received but not decodable into the expected shape
    #[error("could not decode upstream response: {0}")]
    Decode(String),
}

/// Every provider failure surfaces to clients as upstream unavailability;
/// the distinction between its variants only matters for logs.
impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        GatewayError::upstream_unavailable(err.to_string())
    }
}

/// Read access to a weather data source
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WeatherBackend: Send + Sync {
    /// Geocode a free-text place name
    ///
    /// Candidates come back in the provider's ranking order; an empty vec
    /// means the query matched nothing (which is not an error here).
    async fn resolve_location(
        &self,
        query: &str,
        language: &str,
    ) -> Result<Vec<GeoCandidate>, ProviderError>;

    /// Current conditions at a point
    async fn current_conditions(
        &self,
        point: Coordinates,
        language: &str,
    ) -> Result<CurrentConditions, ProviderError>;

    /// Daily forecast at a point for up to `days` days
    async fn forecast(
        &self,
        point: Coordinates,
        days: u8,
        language: &str,
    ) -> Result<Vec<ForecastDay>, ProviderError>;
}

/// Open-Meteo implementation of [`WeatherBackend`]
pub struct OpenMeteoClient {
    http: reqwest::Client,
    forecast_url: Url,
    geocoding_url: Url,
}

impl OpenMeteoClient {
    /// Build a client bounded by the configured request timeout
    pub fn new(config: &WeatherConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            http,
            forecast_url: config.forecast_url.clone(),
            geocoding_url: config.geocoding_url.clone(),
        })
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Upstream rate limit hit");
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            warn!("Upstream returned status {}", status);
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl WeatherBackend for OpenMeteoClient {
    async fn resolve_location(
        &self,
        query: &str,
        language: &str,
    ) -> Result<Vec<GeoCandidate>, ProviderError> {
        debug!("Geocoding '{}'", query);
        let request = self.http.get(self.geocoding_url.clone()).query(&[
            ("name", query.to_string()),
            ("count", GEOCODE_LIMIT.to_string()),
            ("language", language.to_string()),
            ("format", "json".to_string()),
        ]);

        let response: GeocodingResponse = self.fetch_json(request).await?;
        Ok(map_candidates(response))
    }

    async fn current_conditions(
        &self,
        point: Coordinates,
        _language: &str,
    ) -> Result<CurrentConditions, ProviderError> {
        debug!("Fetching current conditions for {}", point);
        let request = self.http.get(self.forecast_url.clone()).query(&[
            ("latitude", point.latitude.to_string()),
            ("longitude", point.longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
        ]);

        let response: ForecastResponse = self.fetch_json(request).await?;
        map_current(response)
    }

    async fn forecast(
        &self,
        point: Coordinates,
        days: u8,
        _language: &str,
    ) -> Result<Vec<ForecastDay>, ProviderError> {
        let days = days.clamp(1, OPEN_METEO_MAX_DAYS);
        debug!("Fetching {}-day forecast for {}", days, point);
        let request = self.http.get(self.forecast_url.clone()).query(&[
            ("latitude", point.latitude.to_string()),
            ("longitude", point.longitude.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("forecast_days", days.to_string()),
            ("timezone", "auto".to_string()),
        ]);

        let response: ForecastResponse = self.fetch_json(request).await?;
        map_forecast(response)
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    latitude: f64,
    longitude: f64,
    current: Option<CurrentBlock>,
    daily: Option<DailyBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: Option<String>,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    weather_code: u8,
    wind_speed_10m: f64,
    wind_direction_10m: f64,
    pressure_msl: f64,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<NaiveDate>,
    weather_code: Vec<u8>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
    // the provider reports gaps in these two as JSON null
    precipitation_sum: Vec<Option<f64>>,
    relative_humidity_2m_max: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    // omitted entirely when nothing matched
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
    admin1: Option<String>,
    population: Option<u64>,
    timezone: Option<String>,
}

/// The API reports observation times at minute precision, without an offset
fn parse_observation_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

fn map_current(response: ForecastResponse) -> Result<CurrentConditions, ProviderError> {
    let current = response
        .current
        .ok_or_else(|| ProviderError::Decode("response is missing the 'current' block".into()))?;

    Ok(CurrentConditions {
        // the response carries the grid point actually used, which can
        // differ slightly from the requested coordinates
        point: Coordinates::new(response.latitude, response.longitude),
        temperature_c: current.temperature_2m,
        humidity_percent: current.relative_humidity_2m,
        weather_code: current.weather_code,
        wind_speed_kmh: current.wind_speed_10m,
        wind_direction_deg: current.wind_direction_10m,
        pressure_hpa: current.pressure_msl,
        observed_at: current.time.as_deref().and_then(parse_observation_time),
    })
}

fn map_forecast(response: ForecastResponse) -> Result<Vec<ForecastDay>, ProviderError> {
    let daily = response
        .daily
        .ok_or_else(|| ProviderError::Decode("response is missing the 'daily' block".into()))?;

    let mut days = Vec::with_capacity(daily.time.len());
    for (i, date) in daily.time.iter().enumerate() {
        days.push(ForecastDay {
            date: *date,
            weather_code: daily.weather_code.get(i).copied().unwrap_or(0),
            temperature_max_c: daily.temperature_2m_max.get(i).copied().unwrap_or(0.0),
            temperature_min_c: daily.temperature_2m_min.get(i).copied().unwrap_or(0.0),
            precipitation_mm: daily.precipitation_sum.get(i).copied().flatten().unwrap_or(0.0),
            humidity_max_percent: daily.relative_humidity_2m_max.get(i).copied().flatten(),
        });
    }
    Ok(days)
}

fn map_candidates(response: GeocodingResponse) -> Vec<GeoCandidate> {
    response
        .results
        .into_iter()
        .map(|result| GeoCandidate {
            name: result.name,
            latitude: result.latitude,
            longitude: result.longitude,
            country: result.country,
            admin1: result.admin1,
            population: result.population,
            timezone: result.timezone,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_current_from_api_json() {
        let raw = r#"{
            "latitude": 55.75,
            "longitude": 37.625,
            "timezone": "Europe/Moscow",
            "current": {
                "time": "2024-01-15T12:30",
                "temperature_2m": -7.3,
                "relative_humidity_2m": 86,
                "weather_code": 71,
                "wind_speed_10m": 12.4,
                "wind_direction_10m": 245.0,
                "pressure_msl": 1021.4
            }
        }"#;
        let response: ForecastResponse = serde_json::from_str(raw).unwrap();
        let current = map_current(response).unwrap();

        assert!((current.temperature_c - -7.3).abs() < 1e-9);
        assert_eq!(current.weather_code, 71);
        assert!((current.point.latitude - 55.75).abs() < 1e-9);
        let observed = current.observed_at.unwrap();
        assert_eq!(observed.format("%H:%M").to_string(), "12:30");
    }

    #[test]
    fn test_map_current_without_current_block() {
        let raw = r#"{"latitude": 55.75, "longitude": 37.625}"#;
        let response: ForecastResponse = serde_json::from_str(raw).unwrap();
        let err = map_current(response).unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[test]
    fn test_map_forecast_handles_null_gaps() {
        let raw = r#"{
            "latitude": 55.75,
            "longitude": 37.625,
            "daily": {
                "time": ["2024-01-15", "2024-01-16"],
                "weather_code": [3, 61],
                "temperature_2m_max": [-4.0, 1.5],
                "temperature_2m_min": [-9.2, -2.0],
                "precipitation_sum": [null, 4.2],
                "relative_humidity_2m_max": [91, null]
            }
        }"#;
        let response: ForecastResponse = serde_json::from_str(raw).unwrap();
        let days = map_forecast(response).unwrap();

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].precipitation_mm, 0.0);
        assert_eq!(days[0].humidity_max_percent, Some(91.0));
        assert!((days[1].precipitation_mm - 4.2).abs() < 1e-9);
        assert_eq!(days[1].humidity_max_percent, None);
        assert_eq!(days[0].date.to_string(), "2024-01-15");
    }

    #[test]
    fn test_map_candidates_with_empty_results() {
        let response: GeocodingResponse = serde_json::from_str("{}").unwrap();
        assert!(map_candidates(response).is_empty());

        let raw = r#"{"results": [{
            "name": "Москва",
            "latitude": 55.75222,
            "longitude": 37.61556,
            "country": "Россия",
            "admin1": "Москва",
            "population": 10381222,
            "timezone": "Europe/Moscow"
        }]}"#;
        let response: GeocodingResponse = serde_json::from_str(raw).unwrap();
        let candidates = map_candidates(response);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Москва");
        assert_eq!(candidates[0].coordinates().latitude, 55.75222);
    }

    #[test]
    fn test_parse_observation_time_formats() {
        assert!(parse_observation_time("2024-01-15T12:30").is_some());
        assert!(parse_observation_time("2024-01-15T12:30:45").is_some());
        assert!(parse_observation_time("yesterday").is_none());
    }

    #[test]
    fn test_provider_error_surfaces_as_upstream_unavailable() {
        let err: GatewayError = ProviderError::RateLimited.into();
        assert!(matches!(err, GatewayError::UpstreamUnavailable(_)));

        let err: GatewayError = ProviderError::Status { status: 503 }.into();
        assert_eq!(
            err.code(),
            crate::gateway::protocol::error_codes::UPSTREAM_UNAVAILABLE
        );
    }
}
