//! Cross-process wire envelope.
//!
//! Every remote interaction returns `{content, exception}` with exactly one
//! side populated: `content` on HTTP 200, `exception` on 400/500. Any other
//! status is a raw transport error and never envelope-wrapped.

use serde::{Deserialize, Serialize};

/// A type-discriminated JSON payload: `{"type": "<fq name>", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedPayload {
    #[serde(rename = "type")]
    pub type_name: String,
    pub data: serde_json::Value,
}

impl TypedPayload {
    pub fn new(type_name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            type_name: type_name.into(),
            data,
        }
    }
}

/// Wire contract for one remote interaction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEnvelope {
    pub content: Option<TypedPayload>,
    pub exception: Option<TypedPayload>,
}

impl InteractionEnvelope {
    /// Success envelope carrying a typed response.
    pub fn content(type_name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            content: Some(TypedPayload::new(type_name, data)),
            exception: None,
        }
    }

    /// Failure envelope carrying a typed exception.
    pub fn exception(type_name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            content: None,
            exception: Some(TypedPayload::new(type_name, data)),
        }
    }
}
