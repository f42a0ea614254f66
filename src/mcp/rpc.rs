//! JSON-RPC protocol representations and formatting utilities
//!
//! Maps bridge protocol errors onto JSON-RPC error payloads.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde_json::{json, Value};

use crate::errors::ProtocolError;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const TOOL_EXECUTION_ERROR: i32 = -32000;

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn protocol_error_to_json_rpc(id: Option<Value>, err: &ProtocolError) -> Value {
    let message = err.to_string();
    match err {
        ProtocolError::ToolNotFound { name } => json_rpc_error_with_data(
            id,
            INVALID_PARAMS,
            &message,
            Some(json!({
                "code": "tool_not_found",
                "message": message,
                "tool": name,
            })),
        ),
        ProtocolError::InvalidParams(_) => json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
        ProtocolError::ToolExecution {
            tool,
            arguments,
            source,
        } => json_rpc_error_with_data(
            id,
            TOOL_EXECUTION_ERROR,
            &message,
            Some(json!({
                "message": message,
                "tool": tool,
                "arguments": arguments,
                "originalError": source.to_json(),
            })),
        ),
    }
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let error = RpcError {
        code: i64::from(code),
        data,
        message: message.to_string(),
    };
    let response = JsonrpcErrorResponse::new(error, id.as_ref().and_then(value_to_request_id));
    serde_json::to_value(response).unwrap_or_else(|_| {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message }
        })
    })
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        let extra = result.as_object().cloned();
        let response = JsonrpcResultResponse::new(request_id, McpResult { meta: None, extra });
        if let Ok(value) = serde_json::to_value(response) {
            return value;
        }
    }

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

pub fn request_id_to_value(id: RequestId) -> Value {
    match id {
        RequestId::String(value) => Value::String(value),
        RequestId::Integer(value) => Value::Number(value.into()),
    }
}
