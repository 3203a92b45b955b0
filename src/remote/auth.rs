//! Outbound credentials and audit metadata.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::Deserialize;

use crate::error::InteractionError;

/// Header naming the application originating the call.
pub const SOURCE_APPLICATION_HEADER: &str = "X-Source-Application";
/// Header carrying the originating client IP.
pub const SOURCE_IP_HEADER: &str = "X-Source-Ip";
/// Header carrying the originating user id.
pub const SOURCE_USER_ID_HEADER: &str = "X-Source-User-Id";

/// Source of bearer tokens for authenticated cross-process calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, InteractionError>;
}

/// Fixed token, for tests and service-to-service secrets injected at
/// startup.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String, InteractionError> {
        Ok(self.token.clone())
    }
}

/// Audit metadata attached to outbound calls when present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuditHeaders {
    pub source_application: Option<String>,
    pub source_ip: Option<String>,
    pub source_user_id: Option<String>,
}

impl AuditHeaders {
    pub(crate) fn apply(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(application) = &self.source_application {
            request = request.header(SOURCE_APPLICATION_HEADER, application);
        }
        if let Some(ip) = &self.source_ip {
            request = request.header(SOURCE_IP_HEADER, ip);
        }
        if let Some(user_id) = &self.source_user_id {
            request = request.header(SOURCE_USER_ID_HEADER, user_id);
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_returns_its_token() {
        let provider = StaticTokenProvider::new("secret");
        assert_eq!(provider.bearer_token().await.unwrap(), "secret");
    }

    #[test]
    fn audit_headers_apply_only_present_values() {
        let audit = AuditHeaders {
            source_application: Some("account-portal".to_string()),
            source_ip: None,
            source_user_id: Some("u-42".to_string()),
        };
        let client = reqwest::Client::new();
        let request = audit
            .apply(client.post("http://localhost/interaction/X"))
            .build()
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers[SOURCE_APPLICATION_HEADER], "account-portal");
        assert_eq!(headers[SOURCE_USER_ID_HEADER], "u-42");
        assert!(!headers.contains_key(SOURCE_IP_HEADER));
    }
}
