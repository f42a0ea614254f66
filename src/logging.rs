use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::http::handlers::SESSION_HEADER;

/// Logs go to stderr so the stdio transport keeps stdout for protocol messages.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// One summary line per HTTP exchange. Event streams log when the stream is handed back,
/// not when it closes.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let session = session_id(&request);
    let started_at = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let session = session.or_else(|| {
        response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    });

    info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        session = session.as_deref().unwrap_or("-"),
        duration_ms = started_at.elapsed().as_millis(),
        "request summary"
    );

    if status.is_server_error() {
        warn!(method = %method, path = %path, status = status.as_u16(), "request failed");
    } else if status.is_client_error() {
        debug!(method = %method, path = %path, status = status.as_u16(), "request rejected");
    }

    response
}

fn session_id(request: &Request) -> Option<String> {
    request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            request.uri().query().and_then(|query| {
                query
                    .split('&')
                    .find_map(|pair| pair.strip_prefix("sessionId="))
                    .map(str::to_string)
            })
        })
}
