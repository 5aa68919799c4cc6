//! Weather domain types
//!
//! Plain data carried between the upstream client, the formatter and the
//! tool handlers: geographic points, geocoding candidates and condition
//! snapshots. Everything here is transport-agnostic.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A geographic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Create a point from raw degrees
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parse a `"lat,lon"` string
    ///
    /// Both parts are trimmed and must parse as finite numbers within
    /// `-90..=90` / `-180..=180`. Anything else yields `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let (lat_raw, lon_raw) = input.split_once(',')?;
        let latitude = lat_raw.trim().parse::<f64>().ok()?;
        let longitude = lon_raw.trim().parse::<f64>().ok()?;
        let point = Self {
            latitude,
            longitude,
        };
        point.in_range().then_some(point)
    }

    fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Human-readable label with hemisphere letters, e.g. `55.75°N, 37.62°E`
    pub fn label(&self) -> String {
        let ns = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if self.longitude >= 0.0 { 'E' } else { 'W' };
        format!(
            "{:.2}°{}, {:.2}°{}",
            self.latitude.abs(),
            ns,
            self.longitude.abs(),
            ew
        )
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// One geocoding match, in the provider's ranking order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCandidate {
    /// Localized place name
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Country name, when the provider reports one
    pub country: Option<String>,
    /// First-level administrative area (region/state)
    pub admin1: Option<String>,
    pub population: Option<u64>,
    pub timezone: Option<String>,
}

impl GeoCandidate {
    /// The candidate's geographic point
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// `"Name, Region, Country"` with absent parts skipped
    pub fn full_name(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if let Some(admin1) = self.admin1.as_deref() {
            if admin1 != self.name {
                parts.push(admin1);
            }
        }
        if let Some(country) = self.country.as_deref() {
            parts.push(country);
        }
        parts.join(", ")
    }
}

/// Snapshot of current conditions at a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub point: Coordinates,
    pub temperature_c: f64,
    pub humidity_percent: f64,
    /// WMO weather interpretation code (0-99)
    pub weather_code: u8,
    pub wind_speed_kmh: f64,
    /// Meteorological wind direction in degrees (0-360)
    pub wind_direction_deg: f64,
    /// Mean sea-level pressure
    pub pressure_hpa: f64,
    /// Observation time in the location's local timezone, when reported
    pub observed_at: Option<NaiveDateTime>,
}

/// One day of forecast data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    /// WMO weather interpretation code (0-99)
    pub weather_code: u8,
    pub temperature_max_c: f64,
    pub temperature_min_c: f64,
    pub precipitation_mm: f64,
    pub humidity_max_percent: Option<f64>,
}
