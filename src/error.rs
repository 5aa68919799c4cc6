//! Error handling for the weather gateway
//!
//! Process-level error type following the usual split: `thiserror` for
//! definitions, `anyhow` for ad-hoc propagation in the binary. Protocol-level
//! errors that travel back to clients as JSON-RPC error objects live in
//! [`crate::gateway::errors`]; this type covers everything that stays inside
//! the process (I/O, configuration, HTTP client construction).

use thiserror::Error;

/// Application result type alias
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Main application error enum
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation errors (stdio transport, config files, socket bind)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// HTTP client errors from the upstream weather provider
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Protocol envelope errors (malformed JSON-RPC structure)
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Configuration loading and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Generic application errors
    #[error("Application error: {message}")]
    Application { message: String },
}

impl AppError {
    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new application error
    pub fn application<S: Into<String>>(message: S) -> Self {
        Self::Application {
            message: message.into(),
        }
    }
}
