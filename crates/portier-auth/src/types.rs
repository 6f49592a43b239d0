//! Values exchanged between adapters, the approval flow and the OAuth provider.
//!
//! Sessions and authorization props carry a fixed set of known fields plus an
//! explicit `extra` map for adapter-specific values. The extra map is flattened
//! on the wire, so a props bag serialized into the provider's grant store comes
//! back out field-for-field on refresh.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Grant type the provider reports when a refresh token is exchanged.
pub const REFRESH_TOKEN_GRANT: &str = "refresh_token";

/// Keys owned by [`AuthorizationProps`] itself; never stored in `extra`.
const RESERVED_PROP_KEYS: &[&str] = &["userId", "userEmail", "accessToken", "refreshToken"];

/// Keys owned by [`AuthSession`] itself; never stored in `extra`.
const RESERVED_SESSION_KEYS: &[&str] = &["accessToken", "refreshToken"];

// ─────────────────────────────────────────────────────────────────────────────
// User & Session
// ─────────────────────────────────────────────────────────────────────────────

/// A human principal as identified by the adapter's backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Provider-assigned, opaque, unique per provider.
    pub id: String,
    pub email: Option<String>,
}

impl AuthUser {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
        }
    }
}

/// Live credential bundle for the current user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub access_token: String,
    /// May be empty when the backend issues no refresh token.
    #[serde(default)]
    pub refresh_token: String,
    /// Adapter-specific values (provider base URL, API keys, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthSession {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            extra: Map::new(),
        }
    }

    /// Attach an adapter-specific value. Reserved keys are ignored.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        insert_extra(&mut self.extra, RESERVED_SESSION_KEYS, key.into(), value.into());
        self
    }

    /// Read an adapter-specific string value.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Props
// ─────────────────────────────────────────────────────────────────────────────

/// Properties bound to an issued token.
///
/// Always carries the user id and the session tokens, so a later token
/// exchange can find and refresh the session it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationProps {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthorizationProps {
    /// Base props for a user and session: id, email and both tokens.
    pub fn new(user: &AuthUser, session: &AuthSession) -> Self {
        Self {
            user_id: user.id.clone(),
            user_email: Some(user.email.clone().unwrap_or_default()),
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            extra: Map::new(),
        }
    }

    /// Attach an adapter-specific value. Reserved keys are ignored.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        insert_extra(&mut self.extra, RESERVED_PROP_KEYS, key.into(), value.into());
        self
    }

    /// Read an adapter-specific string value.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Copy of these props carrying a new access token.
    pub fn with_access_token(&self, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..self.clone()
        }
    }

    /// Copy of these props carrying a new token pair.
    pub fn with_tokens(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            ..self.clone()
        }
    }
}

fn insert_extra(extra: &mut Map<String, Value>, reserved: &[&str], key: String, value: Value) {
    if reserved.contains(&key.as_str()) {
        tracing::debug!(key = %key, "Ignoring reserved key in extra fields");
        return;
    }
    extra.insert(key, value);
}

// ─────────────────────────────────────────────────────────────────────────────
// Token Exchange
// ─────────────────────────────────────────────────────────────────────────────

/// A token exchange event reported by the OAuth provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenExchange {
    pub grant_type: String,
    pub props: AuthorizationProps,
}

impl TokenExchange {
    pub fn new(grant_type: impl Into<String>, props: AuthorizationProps) -> Self {
        Self {
            grant_type: grant_type.into(),
            props,
        }
    }

    /// A `refresh_token` exchange for the given props.
    pub fn refresh(props: AuthorizationProps) -> Self {
        Self::new(REFRESH_TOKEN_GRANT, props)
    }

    pub fn is_refresh(&self) -> bool {
        self.grant_type == REFRESH_TOKEN_GRANT
    }
}

/// What an adapter wants changed after a token exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeResult {
    /// Props carried by the next issued access token only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_props: Option<AuthorizationProps>,
    /// Persisted replacement for the grant's props.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_props: Option<AuthorizationProps>,
    /// Lifetime of the next access token, in seconds.
    #[serde(
        default,
        rename = "accessTokenTTL",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_token_ttl: Option<u64>,
}

impl TokenExchangeResult {
    /// Result of a successful refresh: the access token props get the new
    /// access token, the persisted props get the whole new pair.
    pub fn rotated(
        props: &AuthorizationProps,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        let access_token = access_token.into();
        Self {
            access_token_props: Some(props.with_access_token(access_token.clone())),
            new_props: Some(props.with_tokens(access_token, refresh_token)),
            access_token_ttl: None,
        }
    }
}
