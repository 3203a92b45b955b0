//! Interplay - typed interaction mediator
//!
//! Routes typed business requests through a fixed decorator chain
//! (transaction guard → rate limiter → cache → resilience/remote →
//! concrete handler) so workflow handlers stay free of cross-cutting
//! concerns. Requests with no local handler are forwarded over HTTP and
//! their responses (or typed domain faults) are reconstructed from a
//! wire envelope.

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod contract;
pub mod dispatch;
pub mod error;
pub mod limiter;
pub mod remote;
pub mod resilience;

pub use contract::{Contract, FieldError, InteractionContext, Request};
pub use dispatch::{Dispatcher, Handler};
pub use error::InteractionError;
