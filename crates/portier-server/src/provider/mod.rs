//! The OAuth provider collaborator.
//!
//! The provider owns authorization requests and token issuance. The approval
//! flow only asks it to parse the pending request and, once the user approved,
//! to complete it. [`LocalProvider`] is the in-process implementation the
//! binary runs with.

mod local;

#[cfg(test)]
pub(crate) mod mock;

pub use local::{CODE_TTL_SECS, ClientRegistration, Grant, LocalProvider};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use portier_auth::{AuthorizationProps, RequestContext};

/// Shared handle to the provider, created once per process.
pub type SharedProvider = Arc<dyn OAuthProvider>;

/// Errors reported by the provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Malformed or incomplete authorization request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Client id not registered.
    #[error("Unknown client: {0}")]
    UnknownClient(String),

    /// Redirect URI not registered for the client.
    #[error("Redirect URI not allowed for client {client_id}: {redirect_uri}")]
    RedirectMismatch {
        client_id: String,
        redirect_uri: String,
    },

    /// Authorization code or grant unknown, expired or already used.
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),
}

/// A pending OAuth authorization request.
///
/// Owned by the provider. The approval flow carries it through the approval
/// form verbatim; unknown fields are kept in `extra` so nothing is lost on the
/// way through the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthRequest {
    /// Serialize for the approval form's hidden field.
    pub fn to_form_value(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse the approval form's hidden field.
    pub fn from_form_value(value: &str) -> serde_json::Result<Self> {
        serde_json::from_str(value)
    }
}

/// Display metadata stored with a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationMetadata {
    pub label: String,
}

/// Everything the provider needs to complete an approved request.
#[derive(Debug, Clone)]
pub struct CompleteAuthorization {
    pub request: AuthRequest,
    pub user_id: String,
    pub metadata: AuthorizationMetadata,
    pub scope: Vec<String>,
    pub props: AuthorizationProps,
}

/// Outcome of a completed authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedAuthorization {
    /// Where the user agent should go next (the client's redirect URI).
    pub redirect_to: String,
}

/// OAuth provider engine consumed by the approval flow.
#[async_trait]
pub trait OAuthProvider: Send + Sync + std::fmt::Debug {
    /// Parse and validate the authorization request carried by `ctx`.
    async fn parse_auth_request(
        &self,
        ctx: &RequestContext,
    ) -> Result<AuthRequest, ProviderError>;

    /// Complete an approved authorization and return the client redirect.
    async fn complete_authorization(
        &self,
        completion: CompleteAuthorization,
    ) -> Result<CompletedAuthorization, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> AuthRequest {
        AuthRequest {
            response_type: "code".to_string(),
            client_id: "abc".to_string(),
            redirect_uri: "https://client.example/cb".to_string(),
            scope: vec!["read".to_string(), "write".to_string()],
            state: "xyz \"quoted\" <tag>".to_string(),
            code_challenge: Some("challenge".to_string()),
            code_challenge_method: Some("S256".to_string()),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_form_value_round_trip() {
        let original = request();
        let restored = AuthRequest::from_form_value(&original.to_form_value().unwrap()).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_form_value_keeps_unknown_fields() {
        let raw = json!({
            "responseType": "code",
            "clientId": "abc",
            "redirectUri": "https://client.example/cb",
            "scope": [],
            "state": "",
            "resource": "https://api.example.com"
        })
        .to_string();

        let parsed = AuthRequest::from_form_value(&raw).unwrap();
        assert_eq!(parsed.extra.get("resource"), Some(&json!("https://api.example.com")));

        let reparsed: Value = serde_json::from_str(&parsed.to_form_value().unwrap()).unwrap();
        assert_eq!(reparsed, serde_json::from_str::<Value>(&raw).unwrap());
    }

    #[test]
    fn test_form_value_rejects_garbage() {
        assert!(AuthRequest::from_form_value("").is_err());
        assert!(AuthRequest::from_form_value("{\"clientId\": 1}").is_err());
        assert!(AuthRequest::from_form_value("null").is_err());
    }
}
