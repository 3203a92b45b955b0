//! Interaction contract: conventions shared by every workflow call.
//!
//! Requests are immutable values identified by their type. A request may
//! expose a non-empty key for the cache and rate-limiter decorators; a
//! missing key when a keyed decorator needs one is a fatal configuration
//! error, not a soft miss.

mod envelope;
mod registry;

pub use envelope::{InteractionEnvelope, TypedPayload};
pub use registry::{ContractRegistry, FaultRegistry};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A wire-visible contract type.
///
/// `NAME` is the short type name used in envelopes and store keys; the
/// fully-qualified wire name is `{Namespace}.{NAME}`.
pub trait Contract: Send + Sync + 'static {
    const NAME: &'static str;
}

/// A typed workflow request.
pub trait Request: Contract + Serialize {
    type Response: Contract + Serialize + DeserializeOwned;

    /// Key used by the cache and rate-limiter decorators.
    ///
    /// Must be non-empty when a keyed decorator is attached to this type.
    fn key(&self) -> Option<&str> {
        None
    }

    /// Declared validation constraints, evaluated before the handler runs.
    fn validate(&self) -> Vec<FieldError> {
        Vec::new()
    }

    /// Resilience pipeline override for cross-process dispatch. Falls back
    /// to the configured default when absent or unregistered.
    fn pipeline() -> Option<&'static str> {
        None
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Per-dispatch state, created when a request enters the dispatcher and
/// discarded after.
///
/// The invocation id stays stable across a cross-process hop and correlates
/// returned exceptions with the originating call.
#[derive(Debug, Clone)]
pub struct InteractionContext {
    pub invocation_id: Uuid,
    pub validation_errors: Vec<FieldError>,
    pub bypass_cache: bool,
}

impl InteractionContext {
    pub fn new() -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            validation_errors: Vec::new(),
            bypass_cache: false,
        }
    }
}

impl Default for InteractionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_gets_fresh_invocation_id() {
        let a = InteractionContext::new();
        let b = InteractionContext::new();
        assert_ne!(a.invocation_id, b.invocation_id);
        assert!(!a.bypass_cache);
        assert!(a.validation_errors.is_empty());
    }

    #[test]
    fn field_error_round_trips_as_json() {
        let err = FieldError::new("email", "must not be empty");
        let json = serde_json::to_string(&err).unwrap();
        let back: FieldError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
