//! Weather domain
//!
//! The data the gateway actually serves:
//! - domain types: coordinates, geocoding candidates, condition snapshots
//! - the `WeatherBackend` seam and its Open-Meteo implementation
//! - report formatting (WMO codes, compass, recommendations)
//! - the three tool handlers and the prompt catalog

pub mod formatter;
pub mod provider;
pub mod tools;
pub mod types;

pub use provider::{OpenMeteoClient, ProviderError, WeatherBackend};
pub use tools::{build_registry, prompt_catalog, DEFAULT_FORECAST_DAYS, MAX_FORECAST_DAYS};
pub use types::{Coordinates, CurrentConditions, ForecastDay, GeoCandidate};
