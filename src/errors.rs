use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::domain::middleware::Phase;

/// Error type returned by middleware hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest {
        code: &'static str,
        message: &'static str,
    },
    #[error("not found: {message}")]
    NotFound {
        code: &'static str,
        message: &'static str,
    },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: &'static str) -> Self {
        Self::BadRequest { code, message }
    }

    pub fn not_found(code: &'static str, message: &'static str) -> Self {
        Self::NotFound { code, message }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, code, message.to_string())
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message.to_string()),
            Self::Internal { code, message } => {
                tracing::error!(error = %message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Error)]
#[error("{phase} middleware failed: {message}")]
pub struct MiddlewareError {
    pub phase: Phase,
    pub message: String,
    #[source]
    pub source: Option<HookError>,
}

impl MiddlewareError {
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            source: None,
        }
    }

    pub fn from_hook(phase: Phase, source: HookError) -> Self {
        Self {
            phase,
            message: source.to_string(),
            source: Some(source),
        }
    }
}

/// Failure of the outbound call itself. HTTP error statuses are not failures; they
/// reach post middleware as ordinary responses.
#[derive(Debug, Error)]
#[error("backend request failed: {message}")]
pub struct BackendError {
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub body: Option<Value>,
    pub message: String,
}

impl BackendError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            status_text: None,
            body: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status();
        Self {
            status: status.map(|status| status.as_u16()),
            status_text: status
                .and_then(|status| status.canonical_reason())
                .map(str::to_string),
            body: None,
            message: if err.is_timeout() {
                "request timed out".to_string()
            } else {
                err.to_string()
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error(transparent)]
    Middleware(#[from] MiddlewareError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl InvocationError {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Middleware(err) => Some(err.phase),
            Self::Backend(_) => None,
        }
    }

    /// JSON shape reported back to protocol callers as `originalError`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Middleware(err) => json!({
                "type": "MiddlewareError",
                "phase": err.phase,
                "message": err.message,
            }),
            Self::Backend(err) => json!({
                "type": "BackendError",
                "status": err.status,
                "statusText": err.status_text,
                "body": err.body,
                "message": err.message,
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("Error calling tool {tool}: {source}")]
    ToolExecution {
        tool: String,
        arguments: Map<String, Value>,
        #[source]
        source: InvocationError,
    },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no endpoints were supplied; nothing to expose as tools")]
    NoEndpoints,
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build backend client: {0}")]
    BackendClient(String),
    #[error("failed to read endpoints from {path}: {reason}")]
    EndpointsFile { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("server is already running")]
    AlreadyRunning,
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}
