//! Configuration management module
//!
//! Provides layered configuration for the gateway:
//! - TOML-based configuration files with per-field defaults
//! - Environment variable overrides
//! - Validation at startup
//!
//! All values are read once at process start and treated as immutable for the
//! process lifetime; the running components receive plain values, not handles
//! back into this module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AppError, AppResult};
use crate::weather::types::Coordinates;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Network settings for the SSE transport
    pub server: ServerConfig,
    /// Upstream weather provider settings
    pub weather: WeatherConfig,
    /// Response cache settings
    pub cache: CacheConfig,
    /// Session lifecycle settings
    pub session: SessionConfig,
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./weather-mcp.toml
    /// 2. ~/.config/weather-mcp/config.toml
    /// 3. Default configuration
    pub async fn load() -> AppResult<Self> {
        if let Ok(config) = Self::load_from_file("./weather-mcp.toml").await {
            info!("Loaded configuration from ./weather-mcp.toml");
            return Ok(config);
        }

        if let Some(config_path) = Self::user_config_path() {
            if let Ok(config) = Self::load_from_file(&config_path).await {
                info!("Loaded configuration from {}", config_path.display());
                return Ok(config);
            }
        }

        info!("Using default configuration");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    ///
    /// Missing fields fall back to their defaults, so partial files are fine.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path).await?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| AppError::config(format!("failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Apply environment variable overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply environment variable overrides from an arbitrary lookup
    ///
    /// The lookup indirection keeps tests from mutating process-global env.
    /// Unparseable numeric values are logged and ignored.
    pub fn apply_env_from<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(lang) = get("DEFAULT_LANG") {
            self.weather.default_language = lang;
        }
        if let Some(location) = get("DEFAULT_LOCATION") {
            self.weather.default_location = location;
        }
        if let Some(ttl) = get("CACHE_TTL") {
            match ttl.parse() {
                Ok(secs) => self.cache.ttl_secs = secs,
                Err(_) => warn!("Ignoring unparseable CACHE_TTL value: {}", ttl),
            }
        }
        if let Some(timeout) = get("REQUEST_TIMEOUT") {
            match timeout.parse() {
                Ok(secs) => self.weather.request_timeout_secs = secs,
                Err(_) => warn!("Ignoring unparseable REQUEST_TIMEOUT value: {}", timeout),
            }
        }
        if let Some(host) = get("WEATHER_MCP_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("WEATHER_MCP_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring unparseable WEATHER_MCP_PORT value: {}", port),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        debug!("Validating configuration");

        if self.server.port == 0 {
            return Err(AppError::config("server.port must be greater than 0"));
        }

        if self.cache.ttl_secs == 0 {
            return Err(AppError::config("cache.ttl_secs must be greater than 0"));
        }

        if self.cache.sweep_interval_secs < self.cache.ttl_secs {
            return Err(AppError::config(
                "cache.sweep_interval_secs must not be shorter than cache.ttl_secs",
            ));
        }

        if self.weather.request_timeout_secs == 0 {
            return Err(AppError::config(
                "weather.request_timeout_secs must be greater than 0",
            ));
        }

        if Coordinates::parse(&self.weather.default_location).is_none() {
            return Err(AppError::config(format!(
                "weather.default_location is not a \"lat,lon\" pair: {}",
                self.weather.default_location
            )));
        }

        if self.session.idle_timeout_secs == 0 {
            return Err(AppError::config(
                "session.idle_timeout_secs must be greater than 0",
            ));
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    /// Get user configuration directory path
    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("weather-mcp");
            path.push("config.toml");
            path
        })
    }
}

/// Network settings for the SSE transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host for the HTTP listener
    pub host: String,
    /// Bind port for the HTTP listener
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Upstream weather provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Forecast API endpoint
    pub forecast_url: Url,
    /// Geocoding API endpoint
    pub geocoding_url: Url,
    /// Fallback location used when a tool call carries none, as "lat,lon"
    pub default_location: String,
    /// Language passed to the geocoding API
    pub default_language: String,
    /// Upstream request timeout in seconds
    pub request_timeout_secs: u64,
}

impl WeatherConfig {
    /// Upstream request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_url: Url::parse("https://api.open-meteo.com/v1/forecast")
                .expect("static default endpoint URL"),
            geocoding_url: Url::parse("https://geocoding-api.open-meteo.com/v1/search")
                .expect("static default endpoint URL"),
            // Moscow city centre
            default_location: "55.75396,37.620393".to_string(),
            default_language: "ru".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds
    pub ttl_secs: u64,
    /// Background sweep interval in seconds; must not undercut the TTL
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    /// Entry time-to-live as a duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Background sweep interval as a duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            sweep_interval_secs: 900,
        }
    }
}

/// Session lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time in seconds after which a session is closed
    pub idle_timeout_secs: u64,
    /// Reaper pass interval in seconds
    pub reap_interval_secs: u64,
}

impl SessionConfig {
    /// Idle timeout as a duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Reaper pass interval as a duration
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
            reap_interval_secs: 60,
        }
    }
}
