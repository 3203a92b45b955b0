//! Error types shared across the mediator.
//!
//! Only transport failures recover locally (via the resilience pipeline);
//! every other kind propagates to the caller unchanged.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::contract::FieldError;

/// A typed domain failure, either raised locally or reconstructed from a
/// cross-process envelope.
///
/// Implemented for every ordinary error type; `as_any` lets callers recover
/// the concrete reconstructed type after a cross-process hop.
pub trait DomainFault: std::error::Error + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

impl<T> DomainFault for T
where
    T: std::error::Error + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Failure talking to a shared cache or counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Top-level error for a dispatched interaction.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// Fatal wiring mistake: missing cache key, unresolvable request type,
    /// absent limiter rule. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Declared request constraints failed before the handler ran.
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// The keyed request exceeded its configured rate limit.
    #[error("interaction {interaction} was rate limited")]
    RateLimited { interaction: &'static str },

    /// Dispatch was attempted while a database transaction was open.
    #[error("dispatch rejected: a database transaction is open")]
    TransactionOpen,

    /// The shared cache or counter store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Network failure, malformed envelope, or unexpected HTTP status.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The resilience pipeline's overall timeout elapsed.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// Domain failure raised by a local handler.
    #[error("{0}")]
    Domain(Box<dyn DomainFault>),

    /// Domain failure reconstructed from a cross-process envelope with its
    /// original type identity and invocation id.
    #[error("remote interaction failed with {type_name}: {fault}")]
    Remote {
        type_name: String,
        invocation_id: Uuid,
        fault: Box<dyn DomainFault>,
    },
}

impl InteractionError {
    /// Raise a local domain failure.
    pub fn domain<E: DomainFault>(fault: E) -> Self {
        InteractionError::Domain(Box::new(fault))
    }
}
