//! Ordered middleware hooks run around every tool invocation
//!
//! Hooks are registered once through [`MiddlewareConfigBuilder`] and are read-only
//! afterwards. Within a phase, hooks run strictly in registration order and each one
//! is awaited before the next starts.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::domain::context::InvocationContext;
use crate::errors::{HookError, InvocationError, MiddlewareError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Auth,
    Authz,
    Pre,
    Post,
    Error,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Authz => "authz",
            Self::Pre => "pre",
            Self::Post => "post",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the caller identity. `Ok(Some(identity))` replaces the context identity.
#[async_trait]
pub trait AuthHook: Send + Sync {
    async fn authenticate(&self, ctx: &mut InvocationContext)
        -> Result<Option<Value>, HookError>;
}

/// Returns whether the call may proceed.
#[async_trait]
pub trait AuthzHook: Send + Sync {
    async fn authorize(&self, ctx: &InvocationContext) -> Result<bool, HookError>;
}

#[async_trait]
pub trait PreHook: Send + Sync {
    async fn before(&self, ctx: &mut InvocationContext) -> Result<(), HookError>;
}

/// Receives the previous hook's output (the raw backend response for the first hook).
#[async_trait]
pub trait PostHook: Send + Sync {
    async fn after(&self, ctx: &mut InvocationContext, result: Value) -> Result<Value, HookError>;
}

/// Observes a failed invocation. Returning an error replaces the original one.
#[async_trait]
pub trait ErrorHook: Send + Sync {
    async fn on_error(
        &self,
        ctx: &mut InvocationContext,
        error: &InvocationError,
    ) -> Result<(), HookError>;
}

/// A hook tagged with the phase it runs in.
#[derive(Clone)]
pub enum Middleware {
    Auth(Arc<dyn AuthHook>),
    Authz(Arc<dyn AuthzHook>),
    Pre(Arc<dyn PreHook>),
    Post(Arc<dyn PostHook>),
    Error(Arc<dyn ErrorHook>),
}

impl Middleware {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Auth(_) => Phase::Auth,
            Self::Authz(_) => Phase::Authz,
            Self::Pre(_) => Phase::Pre,
            Self::Post(_) => Phase::Post,
            Self::Error(_) => Phase::Error,
        }
    }
}

#[derive(Clone, Default)]
pub struct MiddlewareConfig {
    auth: Vec<Arc<dyn AuthHook>>,
    authz: Vec<Arc<dyn AuthzHook>>,
    pre: Vec<Arc<dyn PreHook>>,
    post: Vec<Arc<dyn PostHook>>,
    error: Vec<Arc<dyn ErrorHook>>,
}

impl fmt::Debug for MiddlewareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareConfig")
            .field("auth", &self.len(Phase::Auth))
            .field("authz", &self.len(Phase::Authz))
            .field("pre", &self.len(Phase::Pre))
            .field("post", &self.len(Phase::Post))
            .field("error", &self.len(Phase::Error))
            .finish()
    }
}

impl MiddlewareConfig {
    pub fn builder() -> MiddlewareConfigBuilder {
        MiddlewareConfigBuilder::default()
    }

    pub fn len(&self, phase: Phase) -> usize {
        match phase {
            Phase::Auth => self.auth.len(),
            Phase::Authz => self.authz.len(),
            Phase::Pre => self.pre.len(),
            Phase::Post => self.post.len(),
            Phase::Error => self.error.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        [Phase::Auth, Phase::Authz, Phase::Pre, Phase::Post, Phase::Error]
            .into_iter()
            .all(|phase| self.len(phase) == 0)
    }

    pub async fn run_auth(&self, ctx: &mut InvocationContext) -> Result<(), MiddlewareError> {
        for hook in &self.auth {
            match hook.authenticate(ctx).await {
                Ok(Some(identity)) if is_truthy(&identity) => ctx.identity = Some(identity),
                Ok(_) => {}
                Err(err) => return Err(MiddlewareError::from_hook(Phase::Auth, err)),
            }
        }
        Ok(())
    }

    pub async fn run_authz(&self, ctx: &InvocationContext) -> Result<(), MiddlewareError> {
        for hook in &self.authz {
            match hook.authorize(ctx).await {
                Ok(true) => {}
                Ok(false) => {
                    return Err(MiddlewareError::new(Phase::Authz, "Authorization denied"))
                }
                Err(err) => return Err(MiddlewareError::from_hook(Phase::Authz, err)),
            }
        }
        Ok(())
    }

    pub async fn run_pre(&self, ctx: &mut InvocationContext) -> Result<(), MiddlewareError> {
        for hook in &self.pre {
            hook.before(ctx)
                .await
                .map_err(|err| MiddlewareError::from_hook(Phase::Pre, err))?;
        }
        Ok(())
    }

    pub async fn run_post(
        &self,
        ctx: &mut InvocationContext,
        raw: Value,
    ) -> Result<Value, MiddlewareError> {
        let mut result = raw;
        for hook in &self.post {
            result = hook
                .after(ctx, result)
                .await
                .map_err(|err| MiddlewareError::from_hook(Phase::Post, err))?;
        }
        Ok(result)
    }

    /// Runs every error hook and returns the error the caller must see: the original
    /// one, or the first failure raised by an error hook.
    pub async fn run_error(
        &self,
        ctx: &mut InvocationContext,
        error: InvocationError,
    ) -> InvocationError {
        for hook in &self.error {
            if let Err(replacement) = hook.on_error(ctx, &error).await {
                tracing::debug!(
                    request_id = %ctx.request_id,
                    original = %error,
                    replacement = %replacement,
                    "error hook replaced invocation error"
                );
                return MiddlewareError::from_hook(Phase::Error, replacement).into();
            }
        }
        error
    }
}

/// Registers hooks in order, the equivalent of `use(phase, hook)` calls made before
/// generation.
#[derive(Default)]
pub struct MiddlewareConfigBuilder {
    config: MiddlewareConfig,
}

impl MiddlewareConfigBuilder {
    pub fn with(mut self, middleware: Middleware) -> Self {
        tracing::debug!(phase = %middleware.phase(), "middleware registered");
        match middleware {
            Middleware::Auth(hook) => self.config.auth.push(hook),
            Middleware::Authz(hook) => self.config.authz.push(hook),
            Middleware::Pre(hook) => self.config.pre.push(hook),
            Middleware::Post(hook) => self.config.post.push(hook),
            Middleware::Error(hook) => self.config.error.push(hook),
        }
        self
    }

    pub fn auth(self, hook: impl AuthHook + 'static) -> Self {
        self.with(Middleware::Auth(Arc::new(hook)))
    }

    pub fn authz(self, hook: impl AuthzHook + 'static) -> Self {
        self.with(Middleware::Authz(Arc::new(hook)))
    }

    pub fn pre(self, hook: impl PreHook + 'static) -> Self {
        self.with(Middleware::Pre(Arc::new(hook)))
    }

    pub fn post(self, hook: impl PostHook + 'static) -> Self {
        self.with(Middleware::Post(Arc::new(hook)))
    }

    pub fn on_error(self, hook: impl ErrorHook + 'static) -> Self {
        self.with(Middleware::Error(Arc::new(hook)))
    }

    pub fn build(self) -> MiddlewareConfig {
        self.config
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}
