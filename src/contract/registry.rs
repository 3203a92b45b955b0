//! Startup registries mapping wire type names to decode targets.
//!
//! Type names arriving on the wire are resolved against an explicit
//! registry built at startup, restricted to one contract namespace. There
//! is no runtime type scanning.

use std::any::TypeId;
use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::contract::Contract;
use crate::error::{DomainFault, InteractionError};

/// Registry of response types that may be deserialized from remote content.
pub struct ContractRegistry {
    namespace: String,
    responses: HashMap<&'static str, TypeId>,
}

impl ContractRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            responses: HashMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Register a response type under its short contract name.
    pub fn register_response<T: Contract>(mut self) -> Self {
        self.responses.insert(T::NAME, TypeId::of::<T>());
        self
    }

    /// Fully-qualified wire name for a short contract name.
    pub fn qualified_name(&self, short_name: &str) -> String {
        format!("{}.{}", self.namespace, short_name)
    }

    /// Strip the contract namespace from a declared wire type name.
    fn short_name<'a>(&self, declared: &'a str) -> Result<&'a str, InteractionError> {
        declared
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| {
                InteractionError::Configuration(format!(
                    "declared type {declared} is outside contract namespace {}",
                    self.namespace
                ))
            })
    }

    /// Check that a declared wire type name resolves to `T`.
    pub fn resolve_response<T: Contract>(&self, declared: &str) -> Result<(), InteractionError> {
        let short = self.short_name(declared)?;
        match self.responses.get(short) {
            Some(id) if *id == TypeId::of::<T>() => Ok(()),
            Some(_) => Err(InteractionError::Configuration(format!(
                "declared type {declared} does not match the expected response {}",
                T::NAME
            ))),
            None => Err(InteractionError::Configuration(format!(
                "declared type {declared} is not a registered response"
            ))),
        }
    }
}

type FaultFactory =
    Box<dyn Fn(serde_json::Value) -> Result<Box<dyn DomainFault>, serde_json::Error> + Send + Sync>;

/// Registry of exception discriminators and their decode factories.
///
/// A registered fault type deserializes only its declared fields; message
/// text and stack traces never cross the process boundary.
pub struct FaultRegistry {
    namespace: String,
    factories: HashMap<String, FaultFactory>,
}

impl FaultRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            factories: HashMap::new(),
        }
    }

    /// Register a fault type under its short contract name.
    pub fn register<E>(mut self, short_name: &str) -> Self
    where
        E: DomainFault + DeserializeOwned,
    {
        self.factories.insert(
            short_name.to_string(),
            Box::new(|data| {
                let fault: E = serde_json::from_value(data)?;
                Ok(Box::new(fault) as Box<dyn DomainFault>)
            }),
        );
        self
    }

    /// Reconstruct a fault from its declared wire type name and payload.
    pub fn decode(
        &self,
        declared: &str,
        data: serde_json::Value,
    ) -> Result<Box<dyn DomainFault>, InteractionError> {
        let short = declared
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| {
                InteractionError::Configuration(format!(
                    "declared exception {declared} is outside contract namespace {}",
                    self.namespace
                ))
            })?;
        let factory = self.factories.get(short).ok_or_else(|| {
            InteractionError::Configuration(format!(
                "declared exception {declared} is not a registered fault"
            ))
        })?;
        factory(data).map_err(|e| {
            InteractionError::Transport(format!("malformed exception payload for {declared}: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use thiserror::Error;

    struct ExampleResponse;
    impl Contract for ExampleResponse {
        const NAME: &'static str = "ExampleResponse";
    }

    struct OtherResponse;
    impl Contract for OtherResponse {
        const NAME: &'static str = "OtherResponse";
    }

    #[derive(Debug, Deserialize, Error)]
    #[error("quota of {limit} exceeded")]
    struct QuotaExceeded {
        limit: u32,
    }

    fn registry() -> ContractRegistry {
        ContractRegistry::new("Contracts")
            .register_response::<ExampleResponse>()
            .register_response::<OtherResponse>()
    }

    #[test]
    fn resolves_registered_response() {
        assert!(registry()
            .resolve_response::<ExampleResponse>("Contracts.ExampleResponse")
            .is_ok());
    }

    #[test]
    fn rejects_type_outside_namespace() {
        let err = registry()
            .resolve_response::<ExampleResponse>("System.Diagnostics.Process")
            .unwrap_err();
        assert!(matches!(err, InteractionError::Configuration(_)));
    }

    #[test]
    fn rejects_mismatched_response_type() {
        let err = registry()
            .resolve_response::<ExampleResponse>("Contracts.OtherResponse")
            .unwrap_err();
        assert!(matches!(err, InteractionError::Configuration(_)));
    }

    #[test]
    fn rejects_unregistered_response_type() {
        let err = registry()
            .resolve_response::<ExampleResponse>("Contracts.Missing")
            .unwrap_err();
        assert!(matches!(err, InteractionError::Configuration(_)));
    }

    #[test]
    fn decodes_registered_fault_with_persisted_fields_only() {
        let faults = FaultRegistry::new("Contracts").register::<QuotaExceeded>("QuotaExceeded");
        // Unknown fields (message text, stack trace) are dropped on decode.
        let fault = faults
            .decode(
                "Contracts.QuotaExceeded",
                json!({"limit": 5, "message": "noise", "stackTrace": "..."}),
            )
            .unwrap();
        let concrete = fault
            .as_ref()
            .as_any()
            .downcast_ref::<QuotaExceeded>()
            .unwrap();
        assert_eq!(concrete.limit, 5);
    }

    #[test]
    fn unknown_fault_is_configuration_error() {
        let faults = FaultRegistry::new("Contracts").register::<QuotaExceeded>("QuotaExceeded");
        let err = faults
            .decode("Contracts.Unknown", json!({}))
            .unwrap_err();
        assert!(matches!(err, InteractionError::Configuration(_)));
    }

    #[test]
    fn malformed_fault_payload_is_transport_error() {
        let faults = FaultRegistry::new("Contracts").register::<QuotaExceeded>("QuotaExceeded");
        let err = faults
            .decode("Contracts.QuotaExceeded", json!({"limit": "not a number"}))
            .unwrap_err();
        assert!(matches!(err, InteractionError::Transport(_)));
    }
}
