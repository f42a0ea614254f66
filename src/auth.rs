use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderValue;
use axum_extra::headers::{authorization::Bearer, Authorization, Header};
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::{
    context::InvocationContext,
    middleware::{AuthHook, AuthzHook},
};
use crate::errors::HookError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingToken,
    #[error("malformed authorization header")]
    MalformedHeader,
    #[error("invalid bearer token")]
    InvalidToken,
}

/// Auth hook checking the `Authorization: Bearer` header a caller passes in the call's
/// `headers` argument. The header is removed before the backend request is sent.
#[derive(Debug, Clone)]
pub struct BearerTokenAuth {
    token: Arc<str>,
}

impl BearerTokenAuth {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthHook for BearerTokenAuth {
    async fn authenticate(
        &self,
        ctx: &mut InvocationContext,
    ) -> Result<Option<Value>, HookError> {
        let header_name = ctx
            .request
            .headers
            .keys()
            .find(|name| name.eq_ignore_ascii_case("authorization"))
            .cloned()
            .ok_or(AuthError::MissingToken)?;
        let raw = ctx
            .request
            .headers
            .remove(&header_name)
            .ok_or(AuthError::MissingToken)?;

        let value = HeaderValue::from_str(&raw).map_err(|_| AuthError::MalformedHeader)?;
        let authorization = Authorization::<Bearer>::decode(&mut std::iter::once(&value))
            .map_err(|_| AuthError::MalformedHeader)?;

        if authorization.token() != self.token.as_ref() {
            return Err(AuthError::InvalidToken.into());
        }

        Ok(Some(json!({ "scheme": "bearer", "authenticated": true })))
    }
}

/// Authz hook that only lets calls with an authenticated identity through.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireIdentity;

#[async_trait]
impl AuthzHook for RequireIdentity {
    async fn authorize(&self, ctx: &InvocationContext) -> Result<bool, HookError> {
        Ok(ctx.identity.is_some())
    }
}
