//! MCP protocol core
//!
//! JSON-RPC 2.0 envelope structures and the MCP message shapes the gateway
//! speaks: initialize handshake, tool listing/calls, prompt listing. Field
//! names here are the wire contract — in particular the tool schema field is
//! `inputSchema` and is produced by exactly one type ([`ToolSchema`]), so the
//! advertised schemas can never drift from what validation enforces.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// MCP protocol revision, handled as a `YYYY-MM-DD` tag on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtocolVersion {
    /// Revision year
    pub year: u32,
    /// Revision month
    pub month: u32,
    /// Revision day
    pub day: u32,
}

impl ProtocolVersion {
    /// Protocol revision 2024-11-05
    pub const CURRENT: Self = Self {
        year: 2024,
        month: 11,
        day: 5,
    };

    /// Create a new protocol version
    pub fn new(year: u32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }
}

impl Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for ProtocolVersion {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 3 {
            return Err(AppError::protocol(format!(
                "invalid protocol version format: {}",
                s
            )));
        }

        let year = parts[0]
            .parse()
            .map_err(|_| AppError::protocol("invalid protocol version year"))?;
        let month = parts[1]
            .parse()
            .map_err(|_| AppError::protocol("invalid protocol version month"))?;
        let day = parts[2]
            .parse()
            .map_err(|_| AppError::protocol("invalid protocol version day"))?;

        Ok(Self::new(year, month, day))
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse().map_err(|e: AppError| e.to_string())
    }
}

impl From<ProtocolVersion> for String {
    fn from(version: ProtocolVersion) -> Self {
        version.to_string()
    }
}

/// Request identifier, client-supplied and echoed back verbatim
///
/// The gateway does not enforce uniqueness; duplicate correlation is the
/// client's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    String(String),
    Number(i64),
}

impl MessageId {
    /// Generate a new random message ID
    pub fn generate() -> Self {
        Self::String(Uuid::new_v4().to_string())
    }

    /// Create from string
    pub fn from_string(s: String) -> Self {
        Self::String(s)
    }

    /// Create from number
    pub fn from_number(n: i64) -> Self {
        Self::Number(n)
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::String(s) => write!(f, "{}", s),
            MessageId::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Method names served by the gateway
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const PING: &str = "ping";
    pub const LIST_TOOLS: &str = "tools/list";
    pub const CALL_TOOL: &str = "tools/call";
    pub const LIST_PROMPTS: &str = "prompts/list";
    pub const GET_PROMPT: &str = "prompts/get";
    pub const NOTIFY_INITIALIZED: &str = "notifications/initialized";
}

/// JSON-RPC error codes used on the wire
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    // implementation-defined server errors, -32000..-32099
    pub const LOCATION_NOT_FOUND: i32 = -32001;
    pub const UPSTREAM_UNAVAILABLE: i32 = -32002;
    pub const SESSION_NOT_FOUND: i32 = -32003;
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new error object
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a parse error
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::PARSE_ERROR, message)
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_REQUEST, message)
    }

    /// Create a method not found error
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method '{}' not found", method.into()),
        )
    }

    /// Create an invalid parameters error
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message)
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }
}

/// JSON-RPC request envelope
///
/// A missing `id` marks the message as a notification: it is processed but
/// never answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Request ID, absent for notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Method name
    pub method: String,
    /// Request parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new request with a generated ID
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(MessageId::generate()),
            method: method.into(),
            params: None,
        }
    }

    /// Create a request with parameters
    pub fn with_params(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(MessageId::generate()),
            method: method.into(),
            params: Some(params),
        }
    }

    /// Create a request with a specific ID
    pub fn with_id(id: MessageId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// Whether this request is a notification (no response expected)
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Validate the envelope shape
    pub fn validate(&self) -> AppResult<()> {
        if self.jsonrpc != "2.0" {
            return Err(AppError::protocol(format!(
                "invalid JSON-RPC version: {}",
                self.jsonrpc
            )));
        }

        if self.method.is_empty() {
            return Err(AppError::protocol("method name cannot be empty"));
        }

        Ok(())
    }
}

/// JSON-RPC response envelope
///
/// Exactly one of `result` and `error` is present. The `id` is always
/// serialized; it is `null` only for errors answering unparseable requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Request ID this response answers
    pub id: Option<MessageId>,
    /// Response result (success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Response error (failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(id: MessageId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    ///
    /// `id` is `None` when the request could not be parsed far enough to
    /// recover one.
    pub fn error(id: Option<MessageId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Check if this is a successful response
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Check if this is an error response
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Validate the envelope shape
    pub fn validate(&self) -> AppResult<()> {
        if self.jsonrpc != "2.0" {
            return Err(AppError::protocol(format!(
                "invalid JSON-RPC version: {}",
                self.jsonrpc
            )));
        }

        if self.result.is_some() && self.error.is_some() {
            return Err(AppError::protocol(
                "response cannot have both result and error",
            ));
        }

        if self.result.is_none() && self.error.is_none() {
            return Err(AppError::protocol(
                "response must have either result or error",
            ));
        }

        Ok(())
    }
}

/// Parameters of the `initialize` request
///
/// All fields are optional; the gateway accepts clients leniently and
/// answers with its own version and capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version proposed by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    /// Client capabilities, shape not interpreted by the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,
    /// Client information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<ClientInfo>,
}

/// Client information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name
    pub name: String,
    /// Client version
    pub version: String,
}

/// Result of the `initialize` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version the server speaks
    pub protocol_version: ProtocolVersion,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Server information
    pub server_info: ServerInfo,
}

/// Server capabilities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapabilities>,
    /// Prompt support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptCapabilities>,
}

/// Tool capabilities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCapabilities {
    /// Whether the server emits tool-list change notifications
    #[serde(default)]
    pub list_changed: bool,
}

/// Prompt capabilities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptCapabilities {
    /// Whether the server emits prompt-list change notifications
    #[serde(default)]
    pub list_changed: bool,
}

/// Server information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
}

/// Advertised shape of one tool
///
/// The `inputSchema` field name is a fixed protocol-level contract; client
/// implementations match on it exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema object describing the accepted arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Result of `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Registered tools, in registration order
    pub tools: Vec<ToolSchema>,
}

/// Parameters of `tools/call`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Tool name
    pub name: String,
    /// Tool arguments, may be omitted entirely
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Result of `tools/call`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Result content blocks
    pub content: Vec<ToolContent>,
    /// Set when the content describes a tool-level failure
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Create a plain-text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    /// Text of the first text content block, empty when there is none
    pub fn text_content(&self) -> &str {
        self.content
            .iter()
            .find_map(|block| match block {
                ToolContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }
}

/// One content block of a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Plain-text content
    Text { text: String },
    /// Base64-encoded image content
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// Advertised shape of one prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDescriptor {
    /// Prompt name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Accepted arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

/// One argument of a prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Whether the argument must be supplied
    #[serde(default)]
    pub required: bool,
}

/// Result of `prompts/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResult {
    /// Available prompts
    pub prompts: Vec<PromptDescriptor>,
}

/// Parameters of `prompts/get`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptParams {
    /// Prompt name
    pub name: String,
    /// Prompt arguments
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Result of `prompts/get`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResult {
    /// Prompt description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rendered prompt messages
    pub messages: Vec<PromptMessage>,
}

/// One rendered prompt message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Message role, "user" or "assistant"
    pub role: String,
    /// Message content
    pub content: ToolContent,
}

impl PromptMessage {
    /// Create a user-role text message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: ToolContent::Text { text: text.into() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_protocol_version_display_and_parse() {
        let version = ProtocolVersion::CURRENT;
        assert_eq!(version.to_string(), "2024-11-05");

        let parsed: ProtocolVersion = "2024-11-05".parse().unwrap();
        assert_eq!(parsed, version);

        assert!("2024.11.05".parse::<ProtocolVersion>().is_err());
        assert!("2024-11".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn test_protocol_version_serializes_as_string() {
        let json = serde_json::to_string(&ProtocolVersion::CURRENT).unwrap();
        assert_eq!(json, "\"2024-11-05\"");

        let version: ProtocolVersion = serde_json::from_str("\"2025-03-26\"").unwrap();
        assert_eq!(version, ProtocolVersion::new(2025, 3, 26));
    }

    #[test]
    fn test_message_id_untagged_serde() {
        let numeric: MessageId = serde_json::from_str("7").unwrap();
        assert_eq!(numeric, MessageId::Number(7));
        assert_eq!(serde_json::to_string(&numeric).unwrap(), "7");

        let text: MessageId = serde_json::from_str("\"req-1\"").unwrap();
        assert_eq!(text, MessageId::String("req-1".to_string()));
        assert_eq!(text.to_string(), "req-1");
    }

    #[test]
    fn test_request_parse_and_validate() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#;
        let request: JsonRpcRequest = serde_json::from_str(raw).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.method, methods::LIST_TOOLS);
        assert!(!request.is_notification());
    }

    #[test]
    fn test_notification_has_no_id() {
        let raw = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let request: JsonRpcRequest = serde_json::from_str(raw).unwrap();
        assert!(request.validate().is_ok());
        assert!(request.is_notification());
    }

    #[test]
    fn test_request_rejects_wrong_version() {
        let raw = r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#;
        let request: JsonRpcRequest = serde_json::from_str(raw).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_response_has_exactly_one_outcome() {
        let id = MessageId::from_number(1);
        let success = JsonRpcResponse::success(id.clone(), json!({"ok": true}));
        assert!(success.is_success());
        assert!(success.validate().is_ok());

        let failure = JsonRpcResponse::error(Some(id), JsonRpcError::invalid_params("bad"));
        assert!(failure.is_error());
        assert!(failure.validate().is_ok());

        let mut both = JsonRpcResponse::success(MessageId::from_number(2), json!(null));
        both.error = Some(JsonRpcError::internal_error("x"));
        assert!(both.validate().is_err());
    }

    #[test]
    fn test_parse_error_response_carries_null_id() {
        let response = JsonRpcResponse::error(None, JsonRpcError::parse_error("bad json"));
        let raw = serde_json::to_string(&response).unwrap();
        assert!(raw.contains("\"id\":null"));
        assert!(raw.contains("-32700"));
    }

    #[test]
    fn test_tool_schema_wire_field_is_input_schema() {
        let schema = ToolSchema {
            name: "get_current_weather".to_string(),
            description: "Current weather".to_string(),
            input_schema: json!({"type": "object"}),
        };
        let raw = serde_json::to_string(&schema).unwrap();
        assert!(raw.contains("\"inputSchema\""));
        assert!(!raw.contains("input_schema"));
    }

    #[test]
    fn test_call_tool_params_default_arguments() {
        let raw = r#"{"name":"search_location"}"#;
        let params: CallToolParams = serde_json::from_str(raw).unwrap();
        assert_eq!(params.name, "search_location");
        assert!(params.arguments.is_empty());
    }

    #[test]
    fn test_call_tool_result_text() {
        let result = CallToolResult::text("sunny");
        let raw = serde_json::to_string(&result).unwrap();
        assert_eq!(raw, r#"{"content":[{"type":"text","text":"sunny"}]}"#);

        let flagged = CallToolResult {
            is_error: Some(true),
            ..CallToolResult::text("failed")
        };
        assert!(serde_json::to_string(&flagged).unwrap().contains("\"isError\":true"));
    }

    #[test]
    fn test_initialize_params_accepts_camel_case() {
        let raw = r#"{"protocolVersion":"2024-11-05","clientInfo":{"name":"t","version":"1"}}"#;
        let params: InitializeParams = serde_json::from_str(raw).unwrap();
        assert_eq!(params.protocol_version.as_deref(), Some("2024-11-05"));
        assert_eq!(params.client_info.unwrap().name, "t");
    }

    #[test]
    fn test_initialize_result_wire_shape() {
        let result = InitializeResult {
            protocol_version: ProtocolVersion::CURRENT,
            capabilities: ServerCapabilities {
                tools: Some(ToolCapabilities::default()),
                prompts: Some(PromptCapabilities::default()),
            },
            server_info: ServerInfo {
                name: "weather-mcp-server".to_string(),
                version: "0.1.0".to_string(),
            },
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["protocolVersion"], "2024-11-05");
        assert_eq!(value["serverInfo"]["name"], "weather-mcp-server");
        assert_eq!(value["capabilities"]["tools"]["listChanged"], false);
    }
}
