//! Distributed rate limiter for keyed requests.
//!
//! Counters live in a shared store under `Limiter:{RequestTypeShortName}:{Key}`.
//! The window is fixed, not sliding: the first interaction in a window owns
//! the expiry and later increments leave it unchanged. The store primitive
//! is a single atomic increment-with-TTL-on-create, so concurrent callers
//! cannot under-enforce the limit.

pub mod memory;
pub mod redis;

pub use memory::InMemoryCounterStore;
pub use redis::RedisCounterStore;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::contract::{InteractionContext, Request};
use crate::dispatch::Handler;
use crate::error::{InteractionError, StoreError};

/// Per-request-type limiter rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitRule {
    pub time_period_in_seconds: u64,
    pub interactions_per_time_period: u64,
}

impl RateLimitRule {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.time_period_in_seconds)
    }
}

/// Outcome of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitOutcome {
    pub was_rejected: bool,
}

/// Shared counter store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter, creating it with `period` TTL on
    /// first use and leaving the expiry unchanged afterwards. Returns the
    /// post-increment count.
    async fn increment(&self, key: &str, period: Duration) -> Result<u64, StoreError>;

    /// Drop the counter, restarting the window on the next increment.
    async fn clear(&self, key: &str) -> Result<(), StoreError>;
}

/// Throttles repeated keyed requests using counters in a shared store.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    rules: HashMap<String, RateLimitRule>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            rules: HashMap::new(),
        }
    }

    pub fn with_rule(mut self, interaction: &str, rule: RateLimitRule) -> Self {
        self.rules.insert(interaction.to_string(), rule);
        self
    }

    pub fn with_rules(mut self, rules: HashMap<String, RateLimitRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    fn counter_key<R: Request>(key: &str) -> String {
        format!("Limiter:{}:{}", R::NAME, key)
    }

    fn request_key<R: Request>(request: &R) -> Result<&str, InteractionError> {
        match request.key() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(InteractionError::Configuration(format!(
                "interaction {} requires a non-empty key for rate limiting",
                R::NAME
            ))),
        }
    }

    /// Count this call against the window and report whether it was rejected.
    pub async fn limit<R: Request>(&self, request: &R) -> Result<LimitOutcome, InteractionError> {
        let rule = self.rules.get(R::NAME).copied().ok_or_else(|| {
            InteractionError::Configuration(format!(
                "no rate limit rule configured for interaction {}",
                R::NAME
            ))
        })?;
        let key = Self::counter_key::<R>(Self::request_key(request)?);

        let count = self.store.increment(&key, rule.period()).await?;
        let was_rejected = count > rule.interactions_per_time_period;
        if was_rejected {
            debug!(key = %key, count, limit = rule.interactions_per_time_period, "rate limit exceeded");
        }
        Ok(LimitOutcome { was_rejected })
    }

    /// Clear the counter so the next call is permitted regardless of prior
    /// count.
    pub async fn reset<R: Request>(&self, request: &R) -> Result<(), InteractionError> {
        let key = Self::counter_key::<R>(Self::request_key(request)?);
        self.store.clear(&key).await?;
        Ok(())
    }
}

/// Decorator rejecting over-limit calls before the inner handler runs.
pub struct RateLimited<H> {
    inner: H,
    limiter: Arc<RateLimiter>,
}

impl<H> RateLimited<H> {
    pub fn new(inner: H, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl<R, H> Handler<R> for RateLimited<H>
where
    R: Request,
    H: Handler<R>,
{
    async fn handle(
        &self,
        ctx: &InteractionContext,
        request: &R,
    ) -> Result<R::Response, InteractionError> {
        let outcome = self.limiter.limit(request).await?;
        if outcome.was_rejected {
            return Err(InteractionError::RateLimited {
                interaction: R::NAME,
            });
        }
        self.inner.handle(ctx, request).await
    }
}
