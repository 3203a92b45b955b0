//! Dispatcher and handler registry.
//!
//! Routes a request, by its runtime type, to the one handler registered for
//! it, or to the cross-process requester when none is registered locally.
//! Declared validation constraints run before the handler; failures abort
//! dispatch with the structured field-error list.

mod guard;

pub use guard::{GuardedDispatcher, TransactionScope, TransactionState};

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::contract::{InteractionContext, Request};
use crate::error::InteractionError;
use crate::remote::RemoteRequester;

/// Implements the behavior for one request type.
///
/// Decorators (cache, rate limiter) also implement this trait and wrap an
/// inner handler; composition is explicit wrapping, never inheritance.
#[async_trait]
pub trait Handler<R: Request>: Send + Sync {
    async fn handle(
        &self,
        ctx: &InteractionContext,
        request: &R,
    ) -> Result<R::Response, InteractionError>;
}

/// Per-call dispatch options.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// Skip cache lookup and storage for this call.
    pub bypass_cache: bool,
}

/// Routes requests through the decorator chain to their handlers.
pub struct Dispatcher {
    handlers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    remote: Option<Arc<RemoteRequester>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder {
            handlers: HashMap::new(),
            remote: None,
        }
    }

    pub async fn dispatch<R: Request>(&self, request: &R) -> Result<R::Response, InteractionError> {
        self.dispatch_with(request, DispatchOptions::default())
            .await
    }

    pub async fn dispatch_with<R: Request>(
        &self,
        request: &R,
        options: DispatchOptions,
    ) -> Result<R::Response, InteractionError> {
        let mut ctx = InteractionContext::new();
        ctx.bypass_cache = options.bypass_cache;
        ctx.validation_errors = request.validate();
        if !ctx.validation_errors.is_empty() {
            debug!(
                interaction = R::NAME,
                failures = ctx.validation_errors.len(),
                "validation failed"
            );
            return Err(InteractionError::Validation(ctx.validation_errors));
        }

        if let Some(entry) = self.handlers.get(&TypeId::of::<R>()) {
            let handler = entry.downcast_ref::<Arc<dyn Handler<R>>>().ok_or_else(|| {
                InteractionError::Configuration(format!(
                    "handler registered for {} has the wrong type",
                    R::NAME
                ))
            })?;
            handler.handle(&ctx, request).await
        } else if let Some(remote) = &self.remote {
            remote.call(&ctx, request).await
        } else {
            Err(InteractionError::Configuration(format!(
                "no handler registered for interaction {}",
                R::NAME
            )))
        }
    }
}

/// Builds the handler registry at startup.
pub struct DispatcherBuilder {
    handlers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    remote: Option<Arc<RemoteRequester>>,
}

impl DispatcherBuilder {
    /// Register the handler (or fully-decorated handler chain) for `R`.
    pub fn register<R: Request>(mut self, handler: Arc<dyn Handler<R>>) -> Self {
        self.handlers.insert(TypeId::of::<R>(), Box::new(handler));
        self
    }

    /// Requester handling every request type without a local registration.
    pub fn remote(mut self, requester: Arc<RemoteRequester>) -> Self {
        self.remote = Some(requester);
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            handlers: self.handlers,
            remote: self.remote,
        }
    }
}
