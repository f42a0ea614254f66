//! The central Model Context Protocol engine
//!
//! Decodes JSON-RPC messages, negotiates `initialize`, and routes `tools/list` and
//! `tools/call` onto the generated tool set and the invocation pipeline.

use rust_mcp_sdk::schema::{
    CallToolRequestParams, CallToolResult, ContentBlock, Implementation, InitializeResult,
    JsonrpcMessage, ListToolsResult, TextContent, Tool,
};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::Capabilities;
use crate::domain::{
    pipeline::{Pipeline, ToolHandler},
    schema::ToolDefinition,
};
use crate::errors::ProtocolError;
use crate::mcp::rpc::{
    is_json_rpc_error, json_rpc_error, json_rpc_result, protocol_error_to_json_rpc,
    request_id_to_value, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
};

/// Newest version first; an unsupported client version is answered with the first entry.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

#[derive(Debug, Clone)]
pub struct GeneratedTool {
    pub definition: ToolDefinition,
    pub handler: ToolHandler,
}

pub struct ProtocolServer {
    tools: Vec<GeneratedTool>,
    pipeline: Pipeline,
    capabilities: Capabilities,
}

impl ProtocolServer {
    pub fn new(tools: Vec<GeneratedTool>, pipeline: Pipeline, capabilities: Capabilities) -> Self {
        Self {
            tools,
            pipeline,
            capabilities,
        }
    }

    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.tools.iter().map(|tool| &tool.definition).collect()
    }

    /// Looks the tool up by exact name; the first generated tool wins on collisions.
    pub async fn call(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, ProtocolError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.definition.name == name)
            .ok_or_else(|| ProtocolError::ToolNotFound {
                name: name.to_string(),
            })?;

        let result = self
            .pipeline
            .invoke(&tool.handler, &arguments)
            .await
            .map_err(|source| ProtocolError::ToolExecution {
                tool: name.to_string(),
                arguments: arguments.clone(),
                source,
            })?;

        let text = match result {
            Value::String(text) => text,
            other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
        };

        Ok(CallToolResult {
            content: vec![ContentBlock::from(TextContent::new(text, None, None))],
            is_error: None,
            meta: None,
            structured_content: None,
        })
    }

    /// Handles one decoded payload, single message or batch.
    pub async fn handle_message(&self, payload: Value) -> Option<Value> {
        let Some(batch) = payload.as_array() else {
            return self.handle_json_rpc_value(payload).await;
        };

        if batch.is_empty() {
            return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
        }

        let mut responses = Vec::new();
        for item in batch {
            if let Some(response) = self.handle_json_rpc_value(item.clone()).await {
                responses.push(response);
            }
        }

        if responses.is_empty() {
            None
        } else {
            Some(Value::Array(responses))
        }
    }

    pub async fn handle_json_rpc_value(&self, payload: Value) -> Option<Value> {
        if !payload.is_object() {
            return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
        }

        let request_id = payload.get("id").cloned();
        let parsed: JsonrpcMessage = match serde_json::from_value(payload) {
            Ok(message) => message,
            Err(_) => return Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")),
        };

        match parsed {
            JsonrpcMessage::Request(request) => {
                let request_id = request_id_to_value(request.id);
                if request.method.trim().is_empty() {
                    return Some(json_rpc_error(Some(request_id), INVALID_REQUEST, "Invalid Request"));
                }

                Some(
                    self.handle_json_rpc_request(
                        Some(request_id),
                        &request.method,
                        request.params.map(Value::Object),
                    )
                    .await,
                )
            }
            JsonrpcMessage::Notification(notification) => {
                info!(method = %notification.method, "mcp notification received");
                None
            }
            JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
                Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request"))
            }
        }
    }

    pub async fn handle_json_rpc_request(
        &self,
        id: Option<Value>,
        method: &str,
        params: Option<Value>,
    ) -> Value {
        let audit_params = redact_audit_params(params.as_ref());

        let response = match method {
            "initialize" => self.initialize(id, params.as_ref()),
            "ping" => json_rpc_result(id, json!({})),
            "tools/list" => self.tools_list(id),
            "tools/call" => self.tools_call(id, params).await,
            "resources/list" if self.capabilities.resources => {
                json_rpc_result(id, json!({ "resources": [] }))
            }
            "prompts/list" if self.capabilities.prompts => {
                json_rpc_result(id, json!({ "prompts": [] }))
            }
            "logging/setLevel" if self.capabilities.logging => json_rpc_result(id, json!({})),
            _ => json_rpc_error(id, METHOD_NOT_FOUND, "Method not found"),
        };

        info!(
            method = %method,
            params = %audit_params,
            outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
            "mcp action audited"
        );

        response
    }

    fn initialize(&self, id: Option<Value>, params: Option<&Value>) -> Value {
        let capabilities = match serde_json::from_value(capabilities_json(self.capabilities)) {
            Ok(capabilities) => capabilities,
            Err(err) => {
                warn!(error = %err, "server capabilities failed to serialize");
                return json_rpc_error(id, INTERNAL_ERROR, "Internal error");
            }
        };

        let initialize_result = InitializeResult {
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                description: None,
                icons: vec![],
                website_url: None,
            },
            capabilities,
            protocol_version: negotiate_protocol_version(params).to_string().into(),
            instructions: None,
            meta: None,
        };

        match serde_json::to_value(initialize_result) {
            Ok(result) => json_rpc_result(id, result),
            Err(_) => json_rpc_error(id, INTERNAL_ERROR, "Internal error"),
        }
    }

    fn tools_list(&self, id: Option<Value>) -> Value {
        let tools = match self
            .tools
            .iter()
            .map(|tool| tool.definition.to_protocol_tool())
            .collect::<Result<Vec<Tool>, _>>()
        {
            Ok(tools) => tools,
            Err(err) => {
                warn!(error = %err, "tool definition is not a valid protocol tool");
                return json_rpc_error(id, INTERNAL_ERROR, "Internal error");
            }
        };

        match serde_json::to_value(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools,
        }) {
            Ok(result) => json_rpc_result(id, result),
            Err(_) => json_rpc_error(id, INTERNAL_ERROR, "Internal error"),
        }
    }

    async fn tools_call(&self, id: Option<Value>, params: Option<Value>) -> Value {
        let Some(raw_params) = params else {
            return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
        };

        let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
            Ok(value) => value,
            Err(err) => {
                return protocol_error_to_json_rpc(
                    id,
                    &ProtocolError::InvalidParams(err.to_string()),
                )
            }
        };

        let arguments = tool_call.arguments.unwrap_or_default();
        match self.call(&tool_call.name, arguments).await {
            Ok(result) => match serde_json::to_value(result) {
                Ok(value) => json_rpc_result(id, value),
                Err(_) => json_rpc_error(id, INTERNAL_ERROR, "Internal error"),
            },
            Err(err) => {
                warn!(tool = %tool_call.name, error = %err, "tool call failed");
                protocol_error_to_json_rpc(id, &err)
            }
        }
    }
}

pub fn negotiate_protocol_version(params: Option<&Value>) -> &'static str {
    let offered = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim);

    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .find(|version| Some(**version) == offered)
        .copied()
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}

fn capabilities_json(capabilities: Capabilities) -> Value {
    let mut value = Map::new();
    if capabilities.tools {
        value.insert("tools".to_string(), json!({ "listChanged": false }));
    }
    if capabilities.resources {
        value.insert(
            "resources".to_string(),
            json!({ "subscribe": false, "listChanged": false }),
        );
    }
    if capabilities.prompts {
        value.insert("prompts".to_string(), json!({ "listChanged": false }));
    }
    if capabilities.logging {
        value.insert("logging".to_string(), json!({}));
    }
    Value::Object(value)
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "cookie" | "set-cookie" | "bearer" | "api_key" | "apikey" | "x-api-key"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}
