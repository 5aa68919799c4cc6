//! MCP gateway
//!
//! Everything between the wire and the weather domain:
//! - JSON-RPC 2.0 + MCP wire types and the error taxonomy
//! - tool registry with schema-backed argument validation
//! - session lifecycle with per-session outbound channels
//! - request dispatch with cached, single-flight tool invocation
//! - the stdio and SSE transport adapters

pub mod dispatcher;
pub mod errors;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use errors::{GatewayError, GatewayResult};
pub use protocol::{
    CallToolResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, MessageId, ProtocolVersion,
    ServerInfo, ToolContent, ToolSchema,
};
pub use registry::{
    ParameterKind, PromptSpec, ToolDescriptor, ToolHandler, ToolParameter, ToolRegistry,
    ToolRegistryBuilder,
};
pub use session::{PushError, SessionManager, SessionState};
