//! In-process OAuth provider.
//!
//! Validates authorize requests, records approved grants in memory and hands
//! back single-use authorization codes. Token minting is left to whatever sits
//! behind [`LocalProvider::redeem_code`]; this type only keeps the grant and
//! its props consistent across refreshes.
//!
//! A grant lives as long as its code is pending or once the code has been
//! redeemed. Codes that expire unredeemed are pruned together with their
//! grants on the next approval.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use url::Url;
use uuid::Uuid;

use portier_auth::{AuthAdapter, AuthorizationProps, RequestContext, TokenExchange};

use super::{
    AuthRequest, CompleteAuthorization, CompletedAuthorization, OAuthProvider, ProviderError,
};

/// Lifetime of an authorization code (10 minutes).
pub const CODE_TTL_SECS: i64 = 10 * 60;

const PKCE_S256: &str = "S256";
const PKCE_PLAIN: &str = "plain";

/// A client allowed to use the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRegistration {
    pub client_id: String,
    pub redirect_uris: Vec<String>,
}

/// An approved authorization, as stored by the provider.
#[derive(Debug, Clone)]
pub struct Grant {
    pub id: Uuid,
    pub client_id: String,
    pub user_id: String,
    pub label: String,
    pub scope: Vec<String>,
    pub props: AuthorizationProps,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct PendingCode {
    grant_id: Uuid,
    expires_at: DateTime<Utc>,
}

/// In-memory provider. With no registered clients every client is accepted.
#[derive(Debug, Default)]
pub struct LocalProvider {
    clients: HashMap<String, ClientRegistration>,
    codes: RwLock<HashMap<String, PendingCode>>,
    grants: RwLock<HashMap<Uuid, Grant>>,
}

impl LocalProvider {
    /// Create a provider accepting any client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider restricted to the given clients.
    pub fn with_clients(clients: impl IntoIterator<Item = ClientRegistration>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|client| (client.client_id.clone(), client))
                .collect(),
            ..Self::default()
        }
    }

    /// Number of codes still waiting to be redeemed.
    pub async fn pending_code_count(&self) -> usize {
        self.codes.read().await.len()
    }

    /// Number of grants currently stored.
    pub async fn grant_count(&self) -> usize {
        self.grants.read().await.len()
    }

    /// Look up a grant by id.
    pub async fn grant(&self, grant_id: Uuid) -> Option<Grant> {
        self.grants.read().await.get(&grant_id).cloned()
    }

    /// Exchange an authorization code for its grant. Codes are single use.
    pub async fn redeem_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Grant, ProviderError> {
        let pending = self
            .codes
            .write()
            .await
            .remove(code)
            .ok_or_else(|| ProviderError::InvalidGrant("unknown or used code".to_string()))?;

        if Utc::now() >= pending.expires_at {
            self.grants.write().await.remove(&pending.grant_id);
            return Err(ProviderError::InvalidGrant("code expired".to_string()));
        }

        let grant = self
            .grant(pending.grant_id)
            .await
            .ok_or_else(|| ProviderError::InvalidGrant("grant revoked".to_string()))?;

        if let Err(e) = verify_pkce(&grant, code_verifier) {
            self.grants.write().await.remove(&grant.id);
            return Err(e);
        }
        Ok(grant)
    }

    /// Drop codes that expired unredeemed, along with their grants.
    async fn prune_expired(&self, now: DateTime<Utc>) {
        let mut expired = Vec::new();
        self.codes.write().await.retain(|_, pending| {
            let live = pending.expires_at > now;
            if !live {
                expired.push(pending.grant_id);
            }
            live
        });
        if expired.is_empty() {
            return;
        }

        let mut grants = self.grants.write().await;
        for grant_id in &expired {
            grants.remove(grant_id);
        }
        tracing::debug!(count = expired.len(), "Pruned expired authorization codes");
    }

    /// Run a refresh through the adapter and persist any replacement props.
    ///
    /// Returns the props the next access token should carry. When the adapter
    /// declines to refresh, the current props are returned unchanged.
    pub async fn refresh_grant(
        &self,
        grant_id: Uuid,
        adapter: &dyn AuthAdapter,
    ) -> Result<AuthorizationProps, ProviderError> {
        let current = self
            .grant(grant_id)
            .await
            .ok_or_else(|| ProviderError::InvalidGrant(format!("unknown grant {}", grant_id)))?
            .props;

        let Some(result) = adapter
            .token_exchange_callback(&TokenExchange::refresh(current.clone()))
            .await
        else {
            tracing::debug!(grant_id = %grant_id, "Adapter declined refresh, keeping props");
            return Ok(current);
        };

        let persisted = match result.new_props {
            Some(new_props) => {
                if let Some(grant) = self.grants.write().await.get_mut(&grant_id) {
                    grant.props = new_props.clone();
                }
                new_props
            }
            None => current,
        };

        Ok(result.access_token_props.unwrap_or(persisted))
    }

    fn check_client(&self, client_id: &str, redirect_uri: &str) -> Result<(), ProviderError> {
        if self.clients.is_empty() {
            return Ok(());
        }
        let client = self
            .clients
            .get(client_id)
            .ok_or_else(|| ProviderError::UnknownClient(client_id.to_string()))?;
        if !client.redirect_uris.iter().any(|uri| uri == redirect_uri) {
            return Err(ProviderError::RedirectMismatch {
                client_id: client_id.to_string(),
                redirect_uri: redirect_uri.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OAuthProvider for LocalProvider {
    async fn parse_auth_request(
        &self,
        ctx: &RequestContext,
    ) -> Result<AuthRequest, ProviderError> {
        let response_type = ctx.query_param("response_type").unwrap_or_default();
        if response_type != "code" {
            return Err(ProviderError::InvalidRequest(format!(
                "unsupported response_type '{}'",
                response_type
            )));
        }

        let client_id = ctx
            .query_param("client_id")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::InvalidRequest("missing client_id".to_string()))?;
        let redirect_uri = ctx
            .query_param("redirect_uri")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::InvalidRequest("missing redirect_uri".to_string()))?;
        Url::parse(&redirect_uri)
            .map_err(|e| ProviderError::InvalidRequest(format!("bad redirect_uri: {}", e)))?;
        self.check_client(&client_id, &redirect_uri)?;

        let code_challenge = ctx.query_param("code_challenge").filter(|v| !v.is_empty());
        let code_challenge_method = match (&code_challenge, ctx.query_param("code_challenge_method")) {
            (None, _) => None,
            (Some(_), None) => Some(PKCE_PLAIN.to_string()),
            (Some(_), Some(method)) if method == PKCE_S256 || method == PKCE_PLAIN => Some(method),
            (Some(_), Some(method)) => {
                return Err(ProviderError::InvalidRequest(format!(
                    "unsupported code_challenge_method '{}'",
                    method
                )));
            }
        };

        let scope = ctx
            .query_param("scope")
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(AuthRequest {
            response_type,
            client_id,
            redirect_uri,
            scope,
            state: ctx.query_param("state").unwrap_or_default(),
            code_challenge,
            code_challenge_method,
            extra: Default::default(),
        })
    }

    async fn complete_authorization(
        &self,
        completion: CompleteAuthorization,
    ) -> Result<CompletedAuthorization, ProviderError> {
        let request = completion.request;
        self.check_client(&request.client_id, &request.redirect_uri)?;

        let mut redirect = Url::parse(&request.redirect_uri)
            .map_err(|e| ProviderError::InvalidRequest(format!("bad redirect_uri: {}", e)))?;

        let now = Utc::now();
        self.prune_expired(now).await;

        let grant = Grant {
            id: Uuid::new_v4(),
            client_id: request.client_id.clone(),
            user_id: completion.user_id,
            label: completion.metadata.label,
            scope: completion.scope,
            props: completion.props,
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request.code_challenge_method.clone(),
            created_at: now,
        };
        let code = generate_code();

        tracing::info!(
            grant_id = %grant.id,
            client_id = %grant.client_id,
            user_id = %grant.user_id,
            "Authorization granted"
        );

        self.codes.write().await.insert(
            code.clone(),
            PendingCode {
                grant_id: grant.id,
                expires_at: now + Duration::seconds(CODE_TTL_SECS),
            },
        );
        self.grants.write().await.insert(grant.id, grant);

        {
            let mut query = redirect.query_pairs_mut();
            query.append_pair("code", &code);
            if !request.state.is_empty() {
                query.append_pair("state", &request.state);
            }
        }

        Ok(CompletedAuthorization {
            redirect_to: redirect.into(),
        })
    }
}

/// Generate a random authorization code.
fn generate_code() -> String {
    let mut code_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut code_bytes);
    URL_SAFE_NO_PAD.encode(code_bytes)
}

fn verify_pkce(grant: &Grant, code_verifier: Option<&str>) -> Result<(), ProviderError> {
    let Some(challenge) = &grant.code_challenge else {
        return Ok(());
    };
    let verifier = code_verifier
        .ok_or_else(|| ProviderError::InvalidGrant("missing code_verifier".to_string()))?;

    let computed = match grant.code_challenge_method.as_deref() {
        Some(PKCE_S256) => {
            let mut hasher = Sha256::new();
            hasher.update(verifier.as_bytes());
            URL_SAFE_NO_PAD.encode(hasher.finalize())
        }
        _ => verifier.to_string(),
    };

    if &computed != challenge {
        return Err(ProviderError::InvalidGrant("code_verifier mismatch".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use portier_auth::testing::MockAdapter;
    use portier_auth::{AuthSession, AuthUser, TokenExchangeResult};

    use crate::provider::AuthorizationMetadata;

    fn context(uri: &str) -> RequestContext {
        let (parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        RequestContext::from_parts(&parts)
    }

    fn props() -> AuthorizationProps {
        AuthorizationProps::new(
            &AuthUser::new("user-1", Some("ada@example.com".to_string())),
            &AuthSession::new("at", "rt"),
        )
    }

    fn completion(request: AuthRequest) -> CompleteAuthorization {
        CompleteAuthorization {
            scope: request.scope.clone(),
            request,
            user_id: "user-1".to_string(),
            metadata: AuthorizationMetadata {
                label: "ada@example.com".to_string(),
            },
            props: props(),
        }
    }

    const AUTHORIZE: &str = "/authorize?response_type=code&client_id=abc\
        &redirect_uri=https%3A%2F%2Fclient.example%2Fcb&scope=read%20write&state=s1";

    #[tokio::test]
    async fn test_parse_valid_request() {
        let provider = LocalProvider::new();
        let request = provider.parse_auth_request(&context(AUTHORIZE)).await.unwrap();

        assert_eq!(request.client_id, "abc");
        assert_eq!(request.redirect_uri, "https://client.example/cb");
        assert_eq!(request.scope, vec!["read", "write"]);
        assert_eq!(request.state, "s1");
        assert_eq!(request.code_challenge, None);
    }

    #[tokio::test]
    async fn test_parse_rejects_incomplete_requests() {
        let provider = LocalProvider::new();
        for uri in [
            "/authorize",
            "/authorize?response_type=token&client_id=abc&redirect_uri=https%3A%2F%2Fc.example",
            "/authorize?response_type=code&redirect_uri=https%3A%2F%2Fc.example",
            "/authorize?response_type=code&client_id=abc",
            "/authorize?response_type=code&client_id=abc&redirect_uri=not-a-url",
        ] {
            let err = provider.parse_auth_request(&context(uri)).await.unwrap_err();
            assert!(matches!(err, ProviderError::InvalidRequest(_)), "{uri}: {err}");
        }
    }

    #[tokio::test]
    async fn test_parse_pkce_methods() {
        let provider = LocalProvider::new();
        let base = "/authorize?response_type=code&client_id=abc&redirect_uri=https%3A%2F%2Fc.example";

        let plain = provider
            .parse_auth_request(&context(&format!("{base}&code_challenge=xyz")))
            .await
            .unwrap();
        assert_eq!(plain.code_challenge_method.as_deref(), Some("plain"));

        let s256 = provider
            .parse_auth_request(&context(&format!(
                "{base}&code_challenge=xyz&code_challenge_method=S256"
            )))
            .await
            .unwrap();
        assert_eq!(s256.code_challenge_method.as_deref(), Some("S256"));

        let bad = provider
            .parse_auth_request(&context(&format!(
                "{base}&code_challenge=xyz&code_challenge_method=MD5"
            )))
            .await;
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn test_registered_clients_are_enforced() {
        let provider = LocalProvider::with_clients([ClientRegistration {
            client_id: "abc".to_string(),
            redirect_uris: vec!["https://client.example/cb".to_string()],
        }]);

        assert!(provider.parse_auth_request(&context(AUTHORIZE)).await.is_ok());

        let unknown = AUTHORIZE.replace("client_id=abc", "client_id=other");
        assert!(matches!(
            provider.parse_auth_request(&context(&unknown)).await,
            Err(ProviderError::UnknownClient(_))
        ));

        let elsewhere = AUTHORIZE.replace("client.example", "evil.example");
        assert!(matches!(
            provider.parse_auth_request(&context(&elsewhere)).await,
            Err(ProviderError::RedirectMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_complete_redirects_with_code_and_state() {
        let provider = LocalProvider::new();
        let request = provider.parse_auth_request(&context(AUTHORIZE)).await.unwrap();
        let completed = provider.complete_authorization(completion(request)).await.unwrap();

        let url = Url::parse(&completed.redirect_to).unwrap();
        assert_eq!(url.host_str(), Some("client.example"));
        assert_eq!(url.path(), "/cb");
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert!(!pairs["code"].is_empty());
        assert_eq!(pairs["state"], "s1");
        assert_eq!(provider.grant_count().await, 1);
    }

    #[tokio::test]
    async fn test_complete_rechecks_tampered_redirect() {
        let provider = LocalProvider::with_clients([ClientRegistration {
            client_id: "abc".to_string(),
            redirect_uris: vec!["https://client.example/cb".to_string()],
        }]);
        let mut request = provider.parse_auth_request(&context(AUTHORIZE)).await.unwrap();
        request.redirect_uri = "https://evil.example/steal".to_string();

        assert!(provider.complete_authorization(completion(request)).await.is_err());
        assert_eq!(provider.grant_count().await, 0);
    }

    #[tokio::test]
    async fn test_redeem_code_is_single_use() {
        let provider = LocalProvider::new();
        let request = provider.parse_auth_request(&context(AUTHORIZE)).await.unwrap();
        let completed = provider.complete_authorization(completion(request)).await.unwrap();
        let code = code_from(&completed.redirect_to);

        let grant = provider.redeem_code(&code, None).await.unwrap();
        assert_eq!(grant.user_id, "user-1");
        assert_eq!(grant.label, "ada@example.com");
        assert_eq!(grant.props, props());

        assert!(provider.redeem_code(&code, None).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_codes_are_pruned_with_their_grants() {
        let provider = LocalProvider::new();
        let request = provider.parse_auth_request(&context(AUTHORIZE)).await.unwrap();

        let stale = provider.complete_authorization(completion(request.clone())).await.unwrap();
        let stale_code = code_from(&stale.redirect_to);
        let stale_grant = {
            let mut codes = provider.codes.write().await;
            let pending = codes.get_mut(&stale_code).unwrap();
            pending.expires_at = Utc::now() - Duration::seconds(1);
            pending.grant_id
        };

        let fresh = provider.complete_authorization(completion(request)).await.unwrap();

        assert_eq!(provider.pending_code_count().await, 1);
        assert_eq!(provider.grant_count().await, 1);
        assert!(provider.grant(stale_grant).await.is_none());
        assert!(provider.redeem_code(&stale_code, None).await.is_err());
        assert!(
            provider
                .redeem_code(&code_from(&fresh.redirect_to), None)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_redeemed_grants_survive_pruning() {
        let provider = LocalProvider::new();
        let request = provider.parse_auth_request(&context(AUTHORIZE)).await.unwrap();
        let completed = provider.complete_authorization(completion(request.clone())).await.unwrap();
        let grant = provider
            .redeem_code(&code_from(&completed.redirect_to), None)
            .await
            .unwrap();

        provider.prune_expired(Utc::now() + Duration::seconds(CODE_TTL_SECS * 2)).await;
        assert!(provider.grant(grant.id).await.is_some());
    }

    #[tokio::test]
    async fn test_expired_redemption_drops_grant() {
        let provider = LocalProvider::new();
        let request = provider.parse_auth_request(&context(AUTHORIZE)).await.unwrap();
        let completed = provider.complete_authorization(completion(request)).await.unwrap();
        let code = code_from(&completed.redirect_to);
        provider.codes.write().await.get_mut(&code).unwrap().expires_at =
            Utc::now() - Duration::seconds(1);

        assert!(matches!(
            provider.redeem_code(&code, None).await,
            Err(ProviderError::InvalidGrant(_))
        ));
        assert_eq!(provider.grant_count().await, 0);
    }

    #[tokio::test]
    async fn test_redeem_code_verifies_s256_pkce() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        let provider = LocalProvider::new();
        let uri = format!("{AUTHORIZE}&code_challenge={challenge}&code_challenge_method=S256");

        let request = provider.parse_auth_request(&context(&uri)).await.unwrap();
        let completed = provider.complete_authorization(completion(request.clone())).await.unwrap();
        let code = code_from(&completed.redirect_to);
        assert!(provider.redeem_code(&code, Some("wrong")).await.is_err());
        assert_eq!(provider.grant_count().await, 0);

        let completed = provider.complete_authorization(completion(request)).await.unwrap();
        let code = code_from(&completed.redirect_to);
        assert!(provider.redeem_code(&code, Some(verifier)).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_grant_persists_new_props() {
        let provider = LocalProvider::new();
        let request = provider.parse_auth_request(&context(AUTHORIZE)).await.unwrap();
        let completed = provider.complete_authorization(completion(request)).await.unwrap();
        let grant = provider
            .redeem_code(&code_from(&completed.redirect_to), None)
            .await
            .unwrap();

        let adapter = MockAdapter::signed_out()
            .with_exchange_result(TokenExchangeResult::rotated(&grant.props, "at2", "rt2"));
        let access_props = provider.refresh_grant(grant.id, &adapter).await.unwrap();

        assert_eq!(access_props.access_token, "at2");
        assert_eq!(access_props.refresh_token, "rt");
        let stored = provider.grant(grant.id).await.unwrap();
        assert_eq!(stored.props.access_token, "at2");
        assert_eq!(stored.props.refresh_token, "rt2");

        let exchanges = adapter.exchanges();
        assert_eq!(exchanges.len(), 1);
        assert!(exchanges[0].is_refresh());
        assert_eq!(exchanges[0].props, grant.props);
    }

    #[tokio::test]
    async fn test_refresh_grant_declined_keeps_props() {
        let provider = LocalProvider::new();
        let request = provider.parse_auth_request(&context(AUTHORIZE)).await.unwrap();
        let completed = provider.complete_authorization(completion(request)).await.unwrap();
        let grant = provider
            .redeem_code(&code_from(&completed.redirect_to), None)
            .await
            .unwrap();

        let adapter = MockAdapter::signed_out();
        let access_props = provider.refresh_grant(grant.id, &adapter).await.unwrap();
        assert_eq!(access_props, grant.props);
        assert_eq!(provider.grant(grant.id).await.unwrap().props, grant.props);

        assert!(provider.refresh_grant(Uuid::new_v4(), &adapter).await.is_err());
    }

    fn code_from(redirect_to: &str) -> String {
        Url::parse(redirect_to)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }
}
