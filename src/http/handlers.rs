//! Axum HTTP handlers for the web server
//!
//! Provides the request/response MCP endpoint, and general metadata endpoints.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::TransportKind;
use crate::http::sse::{SSE_MESSAGES_PATH, SSE_PATH};
use crate::mcp::rpc::{json_rpc_error, PARSE_ERROR};
use crate::AppState;

pub const MCP_PATH: &str = "/mcp";
pub const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tools: usize,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub transport: TransportKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_endpoint: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sse_endpoint: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_endpoint: Option<&'static str>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        tools: state.server.list().len(),
        sessions: state.sessions.len(),
    })
}

pub async fn discovery(State(state): State<AppState>) -> Json<DiscoveryResponse> {
    let sse = state.transport == TransportKind::Sse;
    Json(DiscoveryResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        transport: state.transport,
        mcp_endpoint: (!sse).then_some(MCP_PATH),
        sse_endpoint: sse.then_some(SSE_PATH),
        messages_endpoint: sse.then_some(SSE_MESSAGES_PATH),
    })
}

pub async fn mcp_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return (
                StatusCode::OK,
                Json(json_rpc_error(None, PARSE_ERROR, "Parse error")),
            )
                .into_response()
        }
    };

    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| is_initialize(&payload).then(|| Uuid::new_v4().to_string()));

    let mut response = match state.server.handle_message(payload).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };

    if let Some(value) = session_id.and_then(|id| HeaderValue::from_str(&id).ok()) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

/// True for an `initialize` request, alone or anywhere in a batch.
fn is_initialize(payload: &Value) -> bool {
    match payload {
        Value::Array(items) => items.iter().any(is_initialize),
        _ => payload.get("method").and_then(Value::as_str) == Some("initialize"),
    }
}
