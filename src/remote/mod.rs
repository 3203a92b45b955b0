//! Cross-process requester.
//!
//! Acts as the handler for any request type with no local registration:
//! serializes the request to JSON, POSTs it to the peer process through a
//! resolved resilience pipeline, and reconstructs the typed response or
//! domain fault from the returned envelope. This is the sole point where
//! exception identity (type plus declared fields, never message text or
//! stack traces) is the cross-process contract.

mod auth;

pub use auth::{
    AuditHeaders, StaticTokenProvider, TokenProvider, SOURCE_APPLICATION_HEADER, SOURCE_IP_HEADER,
    SOURCE_USER_ID_HEADER,
};

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::contract::{
    Contract, ContractRegistry, FaultRegistry, InteractionContext, InteractionEnvelope, Request,
    TypedPayload,
};
use crate::error::InteractionError;
use crate::resilience::PipelineRegistry;

/// Correlation header carrying the invocation id across the process hop.
pub const INVOCATION_ID_HEADER: &str = "X-Invocation-Id";

/// Parsed outcome of one successful exchange: a definitive envelope side.
enum RemoteReply {
    Content(TypedPayload),
    Fault(TypedPayload),
}

/// Transport-class failure from one attempt.
#[derive(Debug)]
enum CallFailure {
    /// Network error, request timeout, or a 5xx without a parseable
    /// envelope (proxy-class noise). Worth another attempt.
    Retryable(String),
    /// Any other status, or a malformed envelope on a definitive status.
    Fatal(String),
}

impl CallFailure {
    fn is_retryable(&self) -> bool {
        matches!(self, CallFailure::Retryable(_))
    }
}

impl From<CallFailure> for InteractionError {
    fn from(failure: CallFailure) -> Self {
        match failure {
            CallFailure::Retryable(message) | CallFailure::Fatal(message) => {
                InteractionError::Transport(message)
            }
        }
    }
}

/// Forwards unregistered requests over HTTP and reconstructs typed
/// responses and exceptions.
pub struct RemoteRequester {
    client: Client,
    base_url: String,
    contracts: Arc<ContractRegistry>,
    faults: Arc<FaultRegistry>,
    pipelines: Arc<PipelineRegistry>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    audit: AuditHeaders,
}

impl RemoteRequester {
    pub fn new(
        base_url: impl Into<String>,
        contracts: Arc<ContractRegistry>,
        faults: Arc<FaultRegistry>,
        pipelines: Arc<PipelineRegistry>,
    ) -> Result<Self, InteractionError> {
        let client = Client::builder().build().map_err(|e| {
            InteractionError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            contracts,
            faults,
            pipelines,
            token_provider: None,
            audit: AuditHeaders::default(),
        })
    }

    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn with_audit_headers(mut self, audit: AuditHeaders) -> Self {
        self.audit = audit;
        self
    }

    /// Endpoint path derived deterministically from the request type name.
    fn endpoint<R: Request>(&self) -> String {
        format!(
            "{}/interaction/{}",
            self.base_url.trim_end_matches('/'),
            self.contracts.qualified_name(R::NAME)
        )
    }

    /// Forward `request` to the peer process and reconstruct the result.
    pub async fn call<R: Request>(
        &self,
        ctx: &InteractionContext,
        request: &R,
    ) -> Result<R::Response, InteractionError> {
        let body = serde_json::to_string(request).map_err(|e| {
            InteractionError::Configuration(format!(
                "request {} is not serializable: {e}",
                R::NAME
            ))
        })?;
        let url = self.endpoint::<R>();
        let pipeline = self.pipelines.resolve(R::pipeline())?;
        let token = match &self.token_provider {
            Some(provider) => Some(provider.bearer_token().await?),
            None => None,
        };

        debug!(
            interaction = R::NAME,
            url = %url,
            pipeline = pipeline.name(),
            invocation_id = %ctx.invocation_id,
            "dispatching interaction cross-process"
        );

        let reply = pipeline
            .execute(
                || self.send_once(&url, &body, token.as_deref(), ctx),
                CallFailure::is_retryable,
            )
            .await?;

        match reply {
            RemoteReply::Content(payload) => decode_content(&self.contracts, payload),
            RemoteReply::Fault(payload) => {
                Err(decode_fault(&self.faults, payload, ctx.invocation_id))
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        body: &str,
        token: Option<&str>,
        ctx: &InteractionContext,
    ) -> Result<RemoteReply, CallFailure> {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(INVOCATION_ID_HEADER, ctx.invocation_id.to_string())
            .body(body.to_string());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request = self.audit.apply(request);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CallFailure::Retryable(format!("request timed out: {e}"))
            } else {
                CallFailure::Retryable(format!("transport failure: {e}"))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CallFailure::Retryable(format!("failed to read response body: {e}")))?;

        match status {
            StatusCode::OK => {
                let envelope = parse_envelope(&text)
                    .map_err(|e| CallFailure::Fatal(format!("malformed envelope on 200: {e}")))?;
                envelope
                    .content
                    .map(RemoteReply::Content)
                    .ok_or_else(|| CallFailure::Fatal("envelope on 200 carried no content".into()))
            }
            StatusCode::BAD_REQUEST => {
                let envelope = parse_envelope(&text)
                    .map_err(|e| CallFailure::Fatal(format!("malformed envelope on 400: {e}")))?;
                envelope.exception.map(RemoteReply::Fault).ok_or_else(|| {
                    CallFailure::Fatal("envelope on 400 carried no exception".into())
                })
            }
            StatusCode::INTERNAL_SERVER_ERROR => match parse_envelope(&text) {
                // A 500 carrying an envelope is a definitive remote failure.
                Ok(envelope) => envelope.exception.map(RemoteReply::Fault).ok_or_else(|| {
                    CallFailure::Fatal("envelope on 500 carried no exception".into())
                }),
                // A bare 500 is proxy-class noise.
                Err(_) => Err(CallFailure::Retryable(format!(
                    "HTTP 500: {}",
                    truncate(&text)
                ))),
            },
            s if s.is_server_error() => {
                Err(CallFailure::Retryable(format!("HTTP {s}: {}", truncate(&text))))
            }
            s => Err(CallFailure::Fatal(format!(
                "unexpected HTTP status {s}: {}",
                truncate(&text)
            ))),
        }
    }
}

fn parse_envelope(text: &str) -> Result<InteractionEnvelope, serde_json::Error> {
    serde_json::from_str(text)
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

/// Resolve the declared response type within the contract namespace and
/// deserialize the payload into it.
fn decode_content<T>(contracts: &ContractRegistry, payload: TypedPayload) -> Result<T, InteractionError>
where
    T: Contract + DeserializeOwned,
{
    contracts.resolve_response::<T>(&payload.type_name)?;
    serde_json::from_value(payload.data).map_err(|e| {
        InteractionError::Transport(format!(
            "malformed response payload for {}: {e}",
            payload.type_name
        ))
    })
}

/// Reconstruct a typed fault with the original invocation id restored.
fn decode_fault(
    faults: &FaultRegistry,
    payload: TypedPayload,
    invocation_id: Uuid,
) -> InteractionError {
    match faults.decode(&payload.type_name, payload.data) {
        Ok(fault) => InteractionError::Remote {
            type_name: payload.type_name,
            invocation_id,
            fault,
        },
        Err(e) => e,
    }
}
