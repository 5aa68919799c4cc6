//! Weather tools
//!
//! The three tools the gateway exposes, plus the prompt catalog:
//! - `get_current_weather` — conditions snapshot for a location
//! - `get_weather_forecast` — 1-7 day daily forecast
//! - `search_location` — geocoding candidates for a place name
//!
//! Handlers receive arguments the registry has already validated and
//! normalized. Location resolution is shared: explicit `lat`/`lon` win,
//! then a `location` string (used as coordinates when it parses as a
//! `"lat,lon"` pair, geocoded otherwise), then the configured default.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::formatter;
use super::provider::WeatherBackend;
use super::types::Coordinates;
use crate::config::WeatherConfig;
use crate::error::{AppError, AppResult};
use crate::gateway::errors::{GatewayError, GatewayResult};
use crate::gateway::protocol::{CallToolResult, PromptArgument, PromptDescriptor};
use crate::gateway::registry::{
    ParameterKind, PromptSpec, ToolDescriptor, ToolHandler, ToolParameter, ToolRegistry,
};

/// Forecast length used when the caller does not ask for one
pub const DEFAULT_FORECAST_DAYS: u8 = 3;

/// Longest forecast the gateway serves
pub const MAX_FORECAST_DAYS: u8 = 7;

/// State shared by the weather tool handlers
struct WeatherContext {
    backend: Arc<dyn WeatherBackend>,
    default_point: Coordinates,
    language: String,
}

impl WeatherContext {
    /// Resolve the target point and a display label from tool arguments
    async fn resolve_point(
        &self,
        args: &Map<String, Value>,
    ) -> GatewayResult<(Coordinates, String)> {
        let lat = args.get("lat").and_then(Value::as_f64);
        let lon = args.get("lon").and_then(Value::as_f64);
        if let (Some(lat), Some(lon)) = (lat, lon) {
            let point = Coordinates::new(lat, lon);
            return Ok((point, point.label()));
        }

        if let Some(location) = args.get("location").and_then(Value::as_str) {
            if let Some(point) = Coordinates::parse(location) {
                debug!("Location '{}' used as raw coordinates", location);
                return Ok((point, point.label()));
            }
            return self.geocode_first(location).await;
        }

        Ok((self.default_point, self.default_point.label()))
    }

    /// Take the provider's top-ranked geocoding candidate
    async fn geocode_first(&self, query: &str) -> GatewayResult<(Coordinates, String)> {
        let candidates = self
            .backend
            .resolve_location(query, &self.language)
            .await?;
        let first = candidates
            .first()
            .ok_or_else(|| GatewayError::location_not_found(query))?;
        debug!("Geocoded '{}' to {}", query, first.coordinates());
        Ok((first.coordinates(), first.full_name()))
    }
}

struct CurrentWeatherTool {
    context: Arc<WeatherContext>,
}

#[async_trait]
impl ToolHandler for CurrentWeatherTool {
    async fn call(&self, args: Map<String, Value>) -> GatewayResult<CallToolResult> {
        let (point, label) = self.context.resolve_point(&args).await?;
        let current = self
            .context
            .backend
            .current_conditions(point, &self.context.language)
            .await?;
        Ok(CallToolResult::text(formatter::format_current(
            &label, &current,
        )))
    }
}

struct ForecastTool {
    context: Arc<WeatherContext>,
}

#[async_trait]
impl ToolHandler for ForecastTool {
    async fn call(&self, args: Map<String, Value>) -> GatewayResult<CallToolResult> {
        // out-of-range day counts are clamped, never rejected
        let days = args
            .get("days")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_FORECAST_DAYS as i64)
            .clamp(1, MAX_FORECAST_DAYS as i64) as u8;

        let (point, label) = self.context.resolve_point(&args).await?;
        let forecast = self
            .context
            .backend
            .forecast(point, days, &self.context.language)
            .await?;
        Ok(CallToolResult::text(formatter::format_forecast(
            &label, &forecast,
        )))
    }
}

struct SearchLocationTool {
    context: Arc<WeatherContext>,
}

#[async_trait]
impl ToolHandler for SearchLocationTool {
    async fn call(&self, args: Map<String, Value>) -> GatewayResult<CallToolResult> {
        let query = args
            .get("city_name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::invalid_params("missing required parameter 'city_name'")
            })?;

        let candidates = self
            .context
            .backend
            .resolve_location(query, &self.context.language)
            .await?;
        if candidates.is_empty() {
            return Err(GatewayError::location_not_found(query));
        }
        Ok(CallToolResult::text(formatter::format_candidates(
            query,
            &candidates,
        )))
    }
}

fn current_weather_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "get_current_weather",
        "Get current weather conditions for a location",
    )
    .with_parameter(ToolParameter::new(
        "location",
        "City name or \"lat,lon\" coordinates; falls back to the configured default",
        ParameterKind::String,
    ))
    .with_parameter(ToolParameter::new(
        "lat",
        "Latitude in decimal degrees, used together with lon",
        ParameterKind::Number,
    ))
    .with_parameter(ToolParameter::new(
        "lon",
        "Longitude in decimal degrees, used together with lat",
        ParameterKind::Number,
    ))
}

fn forecast_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "get_weather_forecast",
        "Get a daily weather forecast for a location",
    )
    .with_parameter(ToolParameter::new(
        "location",
        "City name or \"lat,lon\" coordinates; falls back to the configured default",
        ParameterKind::String,
    ))
    .with_parameter(ToolParameter::new(
        "lat",
        "Latitude in decimal degrees, used together with lon",
        ParameterKind::Number,
    ))
    .with_parameter(ToolParameter::new(
        "lon",
        "Longitude in decimal degrees, used together with lat",
        ParameterKind::Number,
    ))
    .with_parameter(
        ToolParameter::new(
            "days",
            "Number of forecast days (1-7)",
            ParameterKind::Integer,
        )
        .with_default(json!(DEFAULT_FORECAST_DAYS)),
    )
}

fn search_location_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "search_location",
        "Search for locations matching a city name",
    )
    .with_parameter(
        ToolParameter::new("city_name", "City name to search for", ParameterKind::String)
            .required(),
    )
}

/// Assemble the tool registry over a shared backend
pub fn build_registry(
    backend: Arc<dyn WeatherBackend>,
    config: &WeatherConfig,
) -> AppResult<ToolRegistry> {
    let default_point = Coordinates::parse(&config.default_location).ok_or_else(|| {
        AppError::config(format!(
            "weather.default_location is not a \"lat,lon\" pair: {}",
            config.default_location
        ))
    })?;

    let context = Arc::new(WeatherContext {
        backend,
        default_point,
        language: config.default_language.clone(),
    });

    Ok(ToolRegistry::builder()
        .register(
            current_weather_descriptor(),
            Arc::new(CurrentWeatherTool {
                context: Arc::clone(&context),
            }),
        )
        .register(
            forecast_descriptor(),
            Arc::new(ForecastTool {
                context: Arc::clone(&context),
            }),
        )
        .register(
            search_location_descriptor(),
            Arc::new(SearchLocationTool { context }),
        )
        .build())
}

/// The prompts advertised via `prompts/list`
pub fn prompt_catalog() -> Vec<PromptSpec> {
    let location_argument = PromptArgument {
        name: "location".to_string(),
        description: "City name or coordinates (optional)".to_string(),
        required: false,
    };

    vec![
        PromptSpec {
            descriptor: PromptDescriptor {
                name: "current_weather".to_string(),
                description: "Quick look at the current weather".to_string(),
                arguments: vec![location_argument.clone()],
            },
            build: render_current_weather,
        },
        PromptSpec {
            descriptor: PromptDescriptor {
                name: "weather_forecast".to_string(),
                description: "Weather forecast for the coming days".to_string(),
                arguments: vec![
                    location_argument.clone(),
                    PromptArgument {
                        name: "days".to_string(),
                        description: "Number of forecast days (default 3)".to_string(),
                        required: false,
                    },
                ],
            },
            build: render_weather_forecast,
        },
        PromptSpec {
            descriptor: PromptDescriptor {
                name: "weather_summary".to_string(),
                description: "Weather summary with recommendations".to_string(),
                arguments: vec![location_argument],
            },
            build: render_weather_summary,
        },
    ]
}

/// String form of a prompt argument; empty strings count as absent
fn argument_text(args: &Map<String, Value>, name: &str) -> Option<String> {
    match args.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn render_current_weather(args: &Map<String, Value>) -> String {
    match argument_text(args, "location") {
        Some(location) => format!(
            "Get the current weather for {} using the get_current_weather tool",
            location
        ),
        None => "Get the current weather using the get_current_weather tool".to_string(),
    }
}

fn render_weather_forecast(args: &Map<String, Value>) -> String {
    let days = argument_text(args, "days").unwrap_or_else(|| DEFAULT_FORECAST_DAYS.to_string());
    match argument_text(args, "location") {
        Some(location) => format!(
            "Get the weather forecast for {} days for {} using the get_weather_forecast tool",
            days, location
        ),
        None => format!(
            "Get the weather forecast for {} days using the get_weather_forecast tool",
            days
        ),
    }
}

fn render_weather_summary(args: &Map<String, Value>) -> String {
    match argument_text(args, "location") {
        Some(location) => format!(
            "Get the current weather for {} using the get_current_weather tool \
             and provide a summary with recommendations",
            location
        ),
        None => "Get the current weather using the get_current_weather tool \
                 and provide a summary with recommendations"
            .to_string(),
    }
}
