//! Response cache decorator.
//!
//! Wraps a handler; a key hit short-circuits the call and the inner handler
//! is invoked zero times. Concurrent misses may recompute the same value
//! (thundering herd is tolerated) since cache entries are advisory, not
//! transactional.

pub mod memory;
pub mod redis;

pub use memory::InMemoryCacheStore;
pub use redis::RedisCacheStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::contract::{Contract, InteractionContext, Request};
use crate::dispatch::Handler;
use crate::error::{InteractionError, StoreError};

/// Shared store for cached response text.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Expiry policy for one request type.
pub struct CachePolicy<R: Request> {
    default_ttl: Duration,
    ttl_override: Option<Arc<dyn Fn(&R, &R::Response) -> Option<Duration> + Send + Sync>>,
}

impl<R: Request> CachePolicy<R> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            ttl_override: None,
        }
    }

    /// Per-request expiry override. Returning `None` vetoes caching for
    /// that call.
    pub fn with_override(
        mut self,
        ttl: impl Fn(&R, &R::Response) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.ttl_override = Some(Arc::new(ttl));
        self
    }

    fn ttl_for(&self, request: &R, response: &R::Response) -> Option<Duration> {
        match &self.ttl_override {
            Some(ttl) => ttl(request, response),
            None => Some(self.default_ttl),
        }
    }
}

/// Cache key: `{ResponseTypeShortName}:{Key}`.
///
/// Namespacing by response family keeps different families from colliding
/// in the shared store. A missing or empty request key is a fatal
/// configuration error, not a miss.
fn cache_key<R: Request>(request: &R) -> Result<String, InteractionError> {
    match request.key() {
        Some(key) if !key.is_empty() => Ok(format!(
            "{}:{}",
            <R::Response as Contract>::NAME,
            key
        )),
        _ => Err(InteractionError::Configuration(format!(
            "interaction {} requires a non-empty key for caching",
            R::NAME
        ))),
    }
}

/// Caching decorator around an inner handler.
pub struct Cached<R: Request, H> {
    inner: H,
    store: Arc<dyn CacheStore>,
    policy: CachePolicy<R>,
}

impl<R: Request, H> Cached<R, H> {
    pub fn new(inner: H, store: Arc<dyn CacheStore>, policy: CachePolicy<R>) -> Self {
        Self {
            inner,
            store,
            policy,
        }
    }
}

#[async_trait]
impl<R, H> Handler<R> for Cached<R, H>
where
    R: Request,
    H: Handler<R>,
{
    async fn handle(
        &self,
        ctx: &InteractionContext,
        request: &R,
    ) -> Result<R::Response, InteractionError> {
        if ctx.bypass_cache {
            return self.inner.handle(ctx, request).await;
        }

        let key = cache_key::<R>(request)?;
        if let Some(text) = self.store.get(&key).await? {
            debug!(key = %key, "cache hit");
            return serde_json::from_str(&text).map_err(|e| {
                StoreError::Backend(format!("corrupt cache entry under {key}: {e}")).into()
            });
        }

        debug!(key = %key, "cache miss");
        let response = self.inner.handle(ctx, request).await?;

        let value = serde_json::to_value(&response).map_err(|e| {
            InteractionError::Configuration(format!(
                "response for {} is not serializable: {e}",
                R::NAME
            ))
        })?;
        // Null responses are never cached.
        if value.is_null() {
            return Ok(response);
        }

        if let Some(ttl) = self.policy.ttl_for(request, &response) {
            self.store.set(&key, &value.to_string(), ttl).await?;
        }
        Ok(response)
    }
}
