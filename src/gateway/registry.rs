//! Tool registry
//!
//! Static mapping of tool name → schema + handler. The registry is assembled
//! through a builder at process startup and immutable afterwards; request
//! handling only ever reads it through a shared reference.
//!
//! Validation and schema advertisement are two views of the same
//! [`ToolParameter`] list, so the arguments a tool accepts and the schema a
//! client sees cannot drift apart.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::warn;

use super::errors::{GatewayError, GatewayResult};
use super::protocol::{CallToolResult, GetPromptResult, PromptDescriptor, PromptMessage, ToolSchema};

/// JSON type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParameterKind {
    /// JSON Schema type name
    pub fn schema_name(&self) -> &'static str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::Number => "number",
            ParameterKind::Integer => "integer",
            ParameterKind::Boolean => "boolean",
        }
    }
}

/// Declared shape of one tool parameter
#[derive(Debug, Clone)]
pub struct ToolParameter {
    /// Parameter name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Expected JSON type
    pub kind: ParameterKind,
    /// Whether the parameter must be supplied
    pub required: bool,
    /// Value substituted when the parameter is omitted
    pub default: Option<Value>,
}

impl ToolParameter {
    /// Create an optional parameter without a default
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ParameterKind,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: false,
            default: None,
        }
    }

    /// Mark the parameter as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the default applied when the parameter is omitted
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Check a supplied value against the declared type
    ///
    /// Numeric parameters additionally accept numeric strings, which are
    /// coerced into JSON numbers in the normalized output; non-numeric text
    /// for a numeric parameter is a type mismatch.
    fn normalize(&self, value: &Value) -> GatewayResult<Value> {
        match self.kind {
            ParameterKind::String => match value {
                Value::String(_) => Ok(value.clone()),
                _ => Err(self.type_mismatch(value)),
            },
            ParameterKind::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                _ => Err(self.type_mismatch(value)),
            },
            ParameterKind::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(|n| json!(n))
                    .map_err(|_| self.type_mismatch(value)),
                _ => Err(self.type_mismatch(value)),
            },
            ParameterKind::Number => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| self.type_mismatch(value)),
                _ => Err(self.type_mismatch(value)),
            },
        }
    }

    fn type_mismatch(&self, value: &Value) -> GatewayError {
        GatewayError::invalid_params(format!(
            "parameter '{}' expects {}, got {}",
            self.name,
            self.kind.schema_name(),
            value_kind(value)
        ))
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Declared shape of one tool
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Tool name, unique within the registry
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Accepted parameters, in advertisement order
    pub parameters: Vec<ToolParameter>,
}

impl ToolDescriptor {
    /// Create a descriptor without parameters
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter declaration
    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Render the JSON Schema object advertised for this tool
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for parameter in &self.parameters {
            let mut property = Map::new();
            property.insert("type".to_string(), json!(parameter.kind.schema_name()));
            property.insert("description".to_string(), json!(parameter.description));
            if let Some(default) = &parameter.default {
                property.insert("default".to_string(), default.clone());
            }
            properties.insert(parameter.name.clone(), Value::Object(property));

            if parameter.required {
                required.push(json!(parameter.name));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }

    /// The advertised wire shape of this tool
    pub fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema(),
        }
    }

    /// Validate supplied arguments and produce the normalized argument map
    ///
    /// Unknown names, missing required parameters and type mismatches are
    /// rejected; defaults are filled in for omitted optional parameters.
    /// An explicit JSON `null` counts as omitted.
    pub fn validate(&self, args: &Map<String, Value>) -> GatewayResult<Map<String, Value>> {
        for name in args.keys() {
            if !self.parameters.iter().any(|p| &p.name == name) {
                return Err(GatewayError::invalid_params(format!(
                    "unknown parameter '{}' for tool '{}'",
                    name, self.name
                )));
            }
        }

        let mut normalized = Map::new();
        for parameter in &self.parameters {
            match args.get(&parameter.name) {
                Some(value) if !value.is_null() => {
                    normalized.insert(parameter.name.clone(), parameter.normalize(value)?);
                }
                _ => {
                    if let Some(default) = &parameter.default {
                        normalized.insert(parameter.name.clone(), default.clone());
                    } else if parameter.required {
                        return Err(GatewayError::invalid_params(format!(
                            "missing required parameter '{}' for tool '{}'",
                            parameter.name, self.name
                        )));
                    }
                }
            }
        }

        Ok(normalized)
    }
}

/// Executable side of a registered tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with validated, normalized arguments
    async fn call(&self, args: Map<String, Value>) -> GatewayResult<CallToolResult>;
}

/// One registered tool: its declared shape plus its handler
pub struct RegisteredTool {
    /// Declared shape
    pub descriptor: ToolDescriptor,
    /// Handler invoked on `tools/call`
    pub handler: Arc<dyn ToolHandler>,
}

/// Startup-time builder for the registry
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: IndexMap<String, RegisteredTool>,
}

impl ToolRegistryBuilder {
    /// Register a tool; a repeated name replaces the earlier registration
    pub fn register(mut self, descriptor: ToolDescriptor, handler: Arc<dyn ToolHandler>) -> Self {
        let name = descriptor.name.clone();
        if self
            .tools
            .insert(name.clone(), RegisteredTool { descriptor, handler })
            .is_some()
        {
            warn!("Tool '{}' registered twice, keeping the later handler", name);
        }
        self
    }

    /// Finish construction; the registry is immutable from here on
    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}

/// Immutable tool table shared across all request-handling contexts
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Start building a registry
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Find a tool by name
    pub fn lookup(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Validate arguments for a named tool
    ///
    /// An unknown tool name maps to `MethodNotFound`, mirroring how unknown
    /// JSON-RPC methods are answered.
    pub fn validate(
        &self,
        name: &str,
        args: &Map<String, Value>,
    ) -> GatewayResult<Map<String, Value>> {
        let tool = self
            .lookup(name)
            .ok_or_else(|| GatewayError::method_not_found(name))?;
        tool.descriptor.validate(args)
    }

    /// Advertised schemas, in registration order
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|tool| tool.descriptor.to_schema())
            .collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// One advertised prompt and its message builder
pub struct PromptSpec {
    /// Advertised shape
    pub descriptor: PromptDescriptor,
    /// Renders the message text from prompt arguments
    pub build: fn(&Map<String, Value>) -> String,
}

impl PromptSpec {
    /// Render the prompt as a single user-role message
    pub fn render(&self, args: &Map<String, Value>) -> GetPromptResult {
        GetPromptResult {
            description: Some(self.descriptor.description.clone()),
            messages: vec![PromptMessage::user((self.build)(args))],
        }
    }
}
