//! Gateway error taxonomy
//!
//! Every failure a client can observe is one of these conditions; all of them
//! are recovered at the dispatcher boundary and answered as structured
//! JSON-RPC errors. None of them terminate a session or the process.
//! The enum is `Clone` because the cache shares one outcome across all
//! callers coalesced onto a single in-flight fetch.

use thiserror::Error;

use super::protocol::{error_codes, JsonRpcError};

/// Gateway result type alias
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Client-visible error conditions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// Malformed JSON-RPC envelope
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown method or unknown tool name
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Parameter schema validation failure
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Geocoding yielded no candidates
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    /// Upstream provider timeout or failure
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Push-transport request referencing an unknown or closed session
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Fault inside the gateway itself
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a method not found error
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound(method.into())
    }

    /// Create an invalid parameters error
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    /// Create a location not found error
    pub fn location_not_found(query: impl Into<String>) -> Self {
        Self::LocationNotFound(query.into())
    }

    /// Create an upstream unavailable error
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(message.into())
    }

    /// Create a session not found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound(session_id.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The JSON-RPC error code for this condition
    pub fn code(&self) -> i32 {
        match self {
            GatewayError::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            GatewayError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            GatewayError::InvalidParams(_) => error_codes::INVALID_PARAMS,
            GatewayError::LocationNotFound(_) => error_codes::LOCATION_NOT_FOUND,
            GatewayError::UpstreamUnavailable(_) => error_codes::UPSTREAM_UNAVAILABLE,
            GatewayError::SessionNotFound(_) => error_codes::SESSION_NOT_FOUND,
            GatewayError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }

    /// Short category label for logging
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::MethodNotFound(_) => "method_not_found",
            GatewayError::InvalidParams(_) => "invalid_params",
            GatewayError::LocationNotFound(_) => "location_not_found",
            GatewayError::UpstreamUnavailable(_) => "upstream_unavailable",
            GatewayError::SessionNotFound(_) => "session_not_found",
            GatewayError::Internal(_) => "internal",
        }
    }

    /// Whether the condition was caused by client input
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidRequest(_)
                | GatewayError::MethodNotFound(_)
                | GatewayError::InvalidParams(_)
                | GatewayError::SessionNotFound(_)
        )
    }

    /// Convert into the wire error object
    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError::new(self.code(), self.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_match_taxonomy() {
        assert_eq!(GatewayError::invalid_request("x").code(), -32600);
        assert_eq!(GatewayError::method_not_found("x").code(), -32601);
        assert_eq!(GatewayError::invalid_params("x").code(), -32602);
        assert_eq!(GatewayError::internal("x").code(), -32603);
        assert_eq!(GatewayError::location_not_found("x").code(), -32001);
        assert_eq!(GatewayError::upstream_unavailable("x").code(), -32002);
        assert_eq!(GatewayError::session_not_found("x").code(), -32003);
    }

    #[test]
    fn test_to_rpc_error_carries_message() {
        let error = GatewayError::location_not_found("Атлантида");
        let rpc = error.to_rpc_error();
        assert_eq!(rpc.code, -32001);
        assert!(rpc.message.contains("Атлантида"));
        assert!(rpc.data.is_none());
    }

    #[test]
    fn test_client_fault_classification() {
        assert!(GatewayError::invalid_params("x").is_client_fault());
        assert!(GatewayError::session_not_found("x").is_client_fault());
        assert!(!GatewayError::upstream_unavailable("x").is_client_fault());
        assert!(!GatewayError::location_not_found("x").is_client_fault());
    }
}
