use std::sync::Arc;

use axum::{
    http::{HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

pub mod auth;
pub mod backend;
pub mod bridge;
pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod transport;

use config::TransportKind;
use http::{
    handlers::{MCP_PATH, SESSION_HEADER},
    sse::{SessionRegistry, SSE_MESSAGES_PATH, SSE_PATH},
};
use mcp::server::ProtocolServer;

#[derive(Clone)]
pub struct AppState {
    pub server: Arc<ProtocolServer>,
    pub sessions: SessionRegistry,
    pub transport: TransportKind,
}

impl AppState {
    pub fn new(
        server: Arc<ProtocolServer>,
        sessions: SessionRegistry,
        transport: TransportKind,
    ) -> Self {
        Self {
            server,
            sessions,
            transport,
        }
    }
}

pub fn build_app(state: AppState, cors: bool) -> Router {
    let protocol = match state.transport {
        TransportKind::Sse => Router::new()
            .route(SSE_PATH, get(http::sse::open_stream))
            .route(SSE_MESSAGES_PATH, post(http::sse::post_message)),
        TransportKind::Http | TransportKind::Stdio => {
            Router::new().route(MCP_PATH, post(http::handlers::mcp_endpoint))
        }
    };

    let app = Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .merge(protocol)
        .layer(middleware::from_fn(logging::request_logging_middleware));

    let app = if cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any)
                .expose_headers([HeaderName::from_static(SESSION_HEADER)]),
        )
    } else {
        app
    };

    app.with_state(state)
}
