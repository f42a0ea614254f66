//! Invocation pipeline: arguments → middleware → backend → middleware → result
//!
//! Phases run strictly in the order auth, authz, pre, backend call, post. Any failure
//! goes through the error phase before it reaches the caller.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::backend::{BackendClient, BackendResponse};
use crate::domain::{
    context::InvocationContext, endpoint::EndpointDescriptor, middleware::MiddlewareConfig,
};
use crate::errors::{BackendError, InvocationError};

/// Everything a tool needs to reach its endpoint, passed explicitly to [`invoke`].
#[derive(Debug, Clone)]
pub struct ToolHandler {
    pub endpoint: Arc<EndpointDescriptor>,
    pub base_url: Arc<str>,
}

/// Shared collaborators for every call on one server.
#[derive(Clone)]
pub struct Pipeline {
    pub middleware: Arc<MiddlewareConfig>,
    pub backend: Arc<dyn BackendClient>,
}

impl Pipeline {
    pub fn new(middleware: MiddlewareConfig, backend: Arc<dyn BackendClient>) -> Self {
        Self {
            middleware: Arc::new(middleware),
            backend,
        }
    }

    pub async fn invoke(
        &self,
        handler: &ToolHandler,
        arguments: &Map<String, Value>,
    ) -> Result<Value, InvocationError> {
        let mut ctx = InvocationContext::new(handler.endpoint.clone(), arguments);
        debug!(
            request_id = %ctx.request_id,
            method = %ctx.request.method,
            path = %ctx.request.path_template,
            "invocation started"
        );

        match self.run(handler, &mut ctx).await {
            Ok(result) => Ok(result),
            Err(err) => {
                warn!(
                    request_id = %ctx.request_id,
                    phase = err.phase().map_or("backend", |phase| phase.as_str()),
                    error = %err,
                    "invocation failed"
                );
                Err(self.middleware.run_error(&mut ctx, err).await)
            }
        }
    }

    async fn run(
        &self,
        handler: &ToolHandler,
        ctx: &mut InvocationContext,
    ) -> Result<Value, InvocationError> {
        self.middleware.run_auth(ctx).await?;
        self.middleware.run_authz(ctx).await?;
        self.middleware.run_pre(ctx).await?;

        let response = self.backend.send(&handler.base_url, &ctx.request).await?;
        debug!(
            request_id = %ctx.request_id,
            status = response.status,
            "backend responded"
        );

        let raw = response_value(&response)?;
        Ok(self.middleware.run_post(ctx, raw).await?)
    }
}

/// JSON shape of the backend response as the first post hook receives it.
fn response_value(response: &BackendResponse) -> Result<Value, BackendError> {
    serde_json::to_value(response).map_err(|err| BackendError {
        status: Some(response.status),
        status_text: Some(response.status_text.clone()),
        body: None,
        message: format!("failed to encode backend response: {err}"),
    })
}
