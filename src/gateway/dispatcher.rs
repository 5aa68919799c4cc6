//! Request dispatch
//!
//! Routing of validated JSON-RPC requests to their handlers:
//! `initialize`, `ping`, `tools/list`, `tools/call`, `prompts/list`,
//! `prompts/get`. Tool calls run through the TTL cache with single-flight
//! coalescing; the cache key is the tool name plus the normalized argument
//! map serialized with sorted keys, so argument order never splits the
//! cache. Every taxonomy error becomes a structured JSON-RPC error
//! response here; nothing escapes to the transport as a panic or an
//! unanswered request.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::errors::{GatewayError, GatewayResult};
use super::protocol::{
    methods, CallToolParams, CallToolResult, GetPromptParams, InitializeParams, InitializeResult,
    JsonRpcRequest, JsonRpcResponse, ListPromptsResult, ListToolsResult, PromptCapabilities,
    ProtocolVersion, ServerCapabilities, ServerInfo, ToolCapabilities,
};
use super::registry::{PromptSpec, ToolRegistry};
use crate::cache::TtlCache;

/// Routes requests to tools, prompts and lifecycle handlers
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    cache: Arc<TtlCache<CallToolResult, GatewayError>>,
    prompts: Vec<PromptSpec>,
    server_info: ServerInfo,
}

impl Dispatcher {
    /// Create a dispatcher over a registry, cache and prompt catalog
    pub fn new(
        registry: Arc<ToolRegistry>,
        cache: Arc<TtlCache<CallToolResult, GatewayError>>,
        prompts: Vec<PromptSpec>,
    ) -> Self {
        Self {
            registry,
            cache,
            prompts,
            server_info: ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Handle one request; notifications produce no response
    pub async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!("Notification '{}' acknowledged", request.method);
            return None;
        };

        debug!("Dispatching '{}' (id {})", request.method, id);
        let response = match self.handle(&request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                warn!(
                    "Request '{}' failed: {} [{}]",
                    request.method,
                    err,
                    err.category()
                );
                JsonRpcResponse::error(Some(id), err.to_rpc_error())
            }
        };
        Some(response)
    }

    async fn handle(&self, request: &JsonRpcRequest) -> GatewayResult<Value> {
        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request),
            methods::PING => Ok(json!({})),
            methods::LIST_TOOLS => self.handle_list_tools(),
            methods::CALL_TOOL => self.handle_call_tool(request).await,
            methods::LIST_PROMPTS => self.handle_list_prompts(),
            methods::GET_PROMPT => self.handle_get_prompt(request),
            other => Err(GatewayError::method_not_found(other)),
        }
    }

    fn handle_initialize(&self, request: &JsonRpcRequest) -> GatewayResult<Value> {
        let params: InitializeParams = match &request.params {
            Some(params) => serde_json::from_value(params.clone()).map_err(|e| {
                GatewayError::invalid_params(format!("malformed initialize params: {}", e))
            })?,
            None => InitializeParams::default(),
        };

        if let Some(client) = &params.client_info {
            info!("Client connected: {} {}", client.name, client.version);
        }
        // version mismatches are accepted, the server answers with its own
        if let Some(version) = &params.protocol_version {
            if version != &ProtocolVersion::CURRENT.to_string() {
                debug!(
                    "Client proposed protocol version {}, serving {}",
                    version,
                    ProtocolVersion::CURRENT
                );
            }
        }

        let result = InitializeResult {
            protocol_version: ProtocolVersion::CURRENT,
            capabilities: ServerCapabilities {
                tools: Some(ToolCapabilities {
                    list_changed: false,
                }),
                prompts: Some(PromptCapabilities {
                    list_changed: false,
                }),
            },
            server_info: self.server_info.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn handle_list_tools(&self) -> GatewayResult<Value> {
        let result = ListToolsResult {
            tools: self.registry.schemas(),
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn handle_call_tool(&self, request: &JsonRpcRequest) -> GatewayResult<Value> {
        let params = request
            .params
            .clone()
            .ok_or_else(|| GatewayError::invalid_params("tools/call requires parameters"))?;
        let params: CallToolParams = serde_json::from_value(params).map_err(|e| {
            GatewayError::invalid_params(format!("malformed tools/call params: {}", e))
        })?;

        let normalized = self.registry.validate(&params.name, &params.arguments)?;
        let key = cache_key(&params.name, &normalized);

        let tool = self
            .registry
            .lookup(&params.name)
            .ok_or_else(|| GatewayError::method_not_found(params.name.as_str()))?;
        let handler = Arc::clone(&tool.handler);

        let result = self
            .cache
            .get_or_fetch(&key, || async move { handler.call(normalized).await })
            .await?;

        debug!("Tool '{}' answered", params.name);
        Ok(serde_json::to_value(result)?)
    }

    fn handle_list_prompts(&self) -> GatewayResult<Value> {
        let result = ListPromptsResult {
            prompts: self
                .prompts
                .iter()
                .map(|prompt| prompt.descriptor.clone())
                .collect(),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn handle_get_prompt(&self, request: &JsonRpcRequest) -> GatewayResult<Value> {
        let params = request
            .params
            .clone()
            .ok_or_else(|| GatewayError::invalid_params("prompts/get requires parameters"))?;
        let params: GetPromptParams = serde_json::from_value(params).map_err(|e| {
            GatewayError::invalid_params(format!("malformed prompts/get params: {}", e))
        })?;

        let prompt = self
            .prompts
            .iter()
            .find(|prompt| prompt.descriptor.name == params.name)
            .ok_or_else(|| {
                GatewayError::invalid_params(format!("unknown prompt '{}'", params.name))
            })?;

        Ok(serde_json::to_value(prompt.render(&params.arguments))?)
    }
}

/// Cache key for a tool invocation
///
/// The normalized arguments are serialized through a `BTreeMap` so key
/// order in the incoming JSON cannot produce distinct cache entries.
fn cache_key(tool: &str, args: &Map<String, Value>) -> String {
    let sorted: BTreeMap<&String, &Value> = args.iter().collect();
    let serialized = serde_json::to_string(&sorted).unwrap_or_default();
    format!("tool:{}:{}", tool, serialized)
}
