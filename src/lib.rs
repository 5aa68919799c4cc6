//! Weather MCP gateway
//!
//! Serves three weather tools (current conditions, daily forecast, location
//! search) over the Model Context Protocol: JSON-RPC 2.0 on a line-framed
//! stdio pipe or an HTTP push transport (SSE stream + POST endpoint).
//!
//! # Architecture
//!
//! The crate is layered:
//! - **Transport layer**: stdio pipe and axum SSE adapters
//! - **Gateway layer**: wire types, session index, schema-validated dispatch
//!   behind a single-flight TTL cache
//! - **Domain layer**: Open-Meteo client and report formatting
//! - **Infrastructure layer**: layered configuration and structured logging

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod weather;

pub use config::Config;
pub use error::{AppError, AppResult};

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging system
///
/// Everything goes to stderr: stdout belongs to the pipe transport when the
/// gateway runs in stdio mode. Levels are configurable via `RUST_LOG`.
pub fn initialize_logging() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_mcp=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}
