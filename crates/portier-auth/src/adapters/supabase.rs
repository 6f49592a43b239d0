//! Supabase adapter backed by the Supabase SSR session cookie.
//!
//! The browser holds the session in `sb-<project-ref>-auth-token`, possibly
//! split into `.0`, `.1`, ... chunks and possibly `base64-` encoded. The user
//! is confirmed against `/auth/v1/user` on every lookup; refreshes go through
//! `/auth/v1/token?grant_type=refresh_token`. When Supabase rejects the stored
//! access token the adapter refreshes it and re-issues the session cookie.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::adapter::AuthAdapter;
use crate::context::{RequestContext, ResponseCookie};
use crate::error::{AuthError, Result};
use crate::types::{AuthSession, AuthUser, AuthorizationProps, TokenExchange, TokenExchangeResult};

/// Prefix Supabase SSR puts on base64url-encoded cookie values.
const BASE64_PREFIX: &str = "base64-";

/// Upper bound on session cookie chunks we will stitch together.
const MAX_COOKIE_CHUNKS: usize = 32;

/// Largest value written into a single session cookie chunk.
const MAX_CHUNK_SIZE: usize = 3180;

/// Lifetime of a re-issued session cookie (400 days).
const SESSION_COOKIE_MAX_AGE: u64 = 400 * 24 * 60 * 60;

pub const BASE_URL_PROP: &str = "supabaseBaseUrl";
pub const ANON_KEY_PROP: &str = "supabaseAnonKey";

/// Connection settings for a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

/// Session payload stored in the SSR cookie.
#[derive(Debug, Deserialize)]
struct StoredSession {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
}

/// Subset of the `/auth/v1/user` response we need.
#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
}

/// Subset of the `/auth/v1/token` response we need.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// A refreshed session: the tokens plus the full payload for the cookie.
#[derive(Debug)]
struct Refreshed {
    tokens: RefreshResponse,
    payload: serde_json::Value,
}

/// Adapter for Supabase Auth.
#[derive(Debug, Clone)]
pub struct SupabaseAdapter {
    client: Client,
    base_url: String,
    anon_key: String,
    cookie_name: String,
}

impl SupabaseAdapter {
    /// Create an adapter for the given project.
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        Self::with_client(config, Client::new())
    }

    /// Create an adapter that uses the given HTTP client.
    pub fn with_client(config: SupabaseConfig, client: Client) -> Result<Self> {
        if config.anon_key.is_empty() {
            return Err(AuthError::Config("Supabase anon key is empty".to_string()));
        }
        let url = Url::parse(&config.url)
            .map_err(|e| AuthError::Config(format!("Invalid Supabase URL: {}", e)))?;
        let cookie_name = storage_cookie_name(&url)?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key,
            cookie_name,
        })
    }

    /// Name of the session cookie this adapter reads.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn stored_session(&self, ctx: &RequestContext) -> Option<StoredSession> {
        let raw = read_chunked_cookie(|name| ctx.current_cookie(name), &self.cookie_name)?;
        match decode_session(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!(error = %e, cookie = %self.cookie_name, "Ignoring unreadable session cookie");
                None
            }
        }
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Option<AuthUser>> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Supabase rejected session");
            return Ok(None);
        }

        let user: SupabaseUser = response
            .json()
            .await
            .map_err(|e| AuthError::Backend(format!("Failed to parse user response: {}", e)))?;

        Ok(Some(AuthUser::new(user.id, user.email)))
    }

    /// Replace the session cookie with `payload`, chunking it when large and
    /// expiring whatever chunks or whole cookie it supersedes.
    fn write_session(&self, ctx: &RequestContext, payload: &serde_json::Value) {
        let value = format!("{}{}", BASE64_PREFIX, URL_SAFE_NO_PAD.encode(payload.to_string()));
        let secure = ctx.is_secure();
        let cookie = |name: String, value: &str| {
            ResponseCookie::new(name, value)
                .with_max_age(SESSION_COOKIE_MAX_AGE)
                .with_secure(secure)
        };
        let chunk_name = |index: usize| format!("{}.{}", self.cookie_name, index);

        let written = if value.len() <= MAX_CHUNK_SIZE {
            ctx.set_cookie(cookie(self.cookie_name.clone(), &value));
            0
        } else {
            // base64url and the prefix are ASCII, so byte chunks are valid strings
            let chunks: Vec<&str> = value
                .as_bytes()
                .chunks(MAX_CHUNK_SIZE)
                .filter_map(|chunk| std::str::from_utf8(chunk).ok())
                .collect();
            for (index, chunk) in chunks.iter().enumerate() {
                ctx.set_cookie(cookie(chunk_name(index), chunk));
            }
            if ctx.current_cookie(&self.cookie_name).is_some() {
                ctx.set_cookie(ResponseCookie::removal(self.cookie_name.clone()));
            }
            chunks.len()
        };

        for index in written..MAX_COOKIE_CHUNKS {
            let name = chunk_name(index);
            if ctx.current_cookie(&name).is_none() {
                break;
            }
            ctx.set_cookie(ResponseCookie::removal(name));
        }
    }

    /// Refresh a rejected session and confirm the user with the new token.
    ///
    /// The new session is written back as a cookie. Any failure means
    /// "signed out".
    async fn refresh_session(
        &self,
        ctx: &RequestContext,
        session: &StoredSession,
    ) -> Option<AuthUser> {
        if session.refresh_token.is_empty() {
            return None;
        }

        let refreshed = match self
            .refresh(&self.base_url, &self.anon_key, &session.refresh_token)
            .await
        {
            Ok(refreshed) => refreshed,
            Err(e) => {
                tracing::debug!(error = %e, "Supabase session refresh failed, treating as signed out");
                return None;
            }
        };
        let access_token = refreshed.tokens.access_token.as_deref()?;

        self.write_session(ctx, &refreshed.payload);
        match self.fetch_user(access_token).await {
            Ok(user) => {
                tracing::info!(
                    cookie = %self.cookie_name,
                    "Refreshed expired Supabase session"
                );
                user
            }
            Err(e) => {
                tracing::warn!(error = %e, "Supabase user lookup failed after refresh");
                None
            }
        }
    }

    async fn refresh(
        &self,
        base_url: &str,
        anon_key: &str,
        refresh_token: &str,
    ) -> Result<Refreshed> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", base_url.trim_end_matches('/')))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", anon_key)
            .bearer_auth(anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Backend(format!(
                "Token refresh failed ({})",
                response.status()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::Backend(format!("Failed to parse refresh response: {}", e)))?;
        let tokens = serde_json::from_value(payload.clone())
            .map_err(|e| AuthError::Backend(format!("Unexpected refresh response: {}", e)))?;

        Ok(Refreshed { tokens, payload })
    }
}

#[async_trait]
impl AuthAdapter for SupabaseAdapter {
    async fn get_user(&self, ctx: &RequestContext) -> Result<Option<AuthUser>> {
        let Some(session) = self.stored_session(ctx) else {
            return Ok(None);
        };

        match self.fetch_user(&session.access_token).await {
            Ok(Some(user)) => Ok(Some(user)),
            Ok(None) => Ok(self.refresh_session(ctx, &session).await),
            Err(e) => {
                tracing::warn!(error = %e, "Supabase user lookup failed, treating as signed out");
                Ok(None)
            }
        }
    }

    async fn get_session(&self, ctx: &RequestContext) -> Result<Option<AuthSession>> {
        Ok(self.stored_session(ctx).map(|stored| {
            AuthSession::new(stored.access_token, stored.refresh_token)
                .with_extra(BASE_URL_PROP, self.base_url.clone())
                .with_extra(ANON_KEY_PROP, self.anon_key.clone())
        }))
    }

    fn authorization_props(
        &self,
        _ctx: &RequestContext,
        user: &AuthUser,
        session: &AuthSession,
    ) -> AuthorizationProps {
        let base_url = session.extra_str(BASE_URL_PROP).unwrap_or(&self.base_url);
        let anon_key = session.extra_str(ANON_KEY_PROP).unwrap_or(&self.anon_key);
        AuthorizationProps::new(user, session)
            .with_extra(BASE_URL_PROP, base_url.to_string())
            .with_extra(ANON_KEY_PROP, anon_key.to_string())
    }

    async fn token_exchange_callback(
        &self,
        exchange: &TokenExchange,
    ) -> Option<TokenExchangeResult> {
        if !exchange.is_refresh() {
            return None;
        }
        let props = &exchange.props;
        if props.refresh_token.is_empty() {
            return None;
        }
        let base_url = props.extra_str(BASE_URL_PROP).unwrap_or(&self.base_url);
        let anon_key = props.extra_str(ANON_KEY_PROP).unwrap_or(&self.anon_key);

        match self.refresh(base_url, anon_key, &props.refresh_token).await {
            Ok(Refreshed { tokens, .. }) => {
                let access_token = tokens
                    .access_token
                    .unwrap_or_else(|| props.access_token.clone());
                let refresh_token = tokens
                    .refresh_token
                    .unwrap_or_else(|| props.refresh_token.clone());
                tracing::debug!(user_id = %props.user_id, "Refreshed Supabase session");
                Some(TokenExchangeResult::rotated(props, access_token, refresh_token))
            }
            Err(e) => {
                tracing::warn!(error = %e, user_id = %props.user_id, "Supabase refresh failed, keeping current tokens");
                None
            }
        }
    }
}

/// `sb-<project-ref>-auth-token`, where the ref is the first host label.
fn storage_cookie_name(url: &Url) -> Result<String> {
    let project_ref = url
        .host_str()
        .and_then(|host| host.split('.').next())
        .filter(|label| !label.is_empty())
        .ok_or_else(|| AuthError::Config(format!("Supabase URL has no host: {}", url)))?;
    Ok(format!("sb-{}-auth-token", project_ref))
}

/// Read a cookie that may have been split into numbered chunks.
fn read_chunked_cookie(get: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    if let Some(value) = get(name) {
        return Some(value);
    }

    let mut combined = String::new();
    for index in 0..MAX_COOKIE_CHUNKS {
        match get(&format!("{}.{}", name, index)) {
            Some(chunk) => combined.push_str(&chunk),
            None => break,
        }
    }
    (!combined.is_empty()).then_some(combined)
}

fn decode_session(raw: &str) -> Result<StoredSession> {
    let json = match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => {
            let bytes = URL_SAFE_NO_PAD
                .decode(encoded.trim_end_matches('='))
                .map_err(|e| AuthError::InvalidSession(format!("bad base64: {}", e)))?;
            String::from_utf8(bytes)
                .map_err(|e| AuthError::InvalidSession(format!("bad utf-8: {}", e)))?
        }
        None => urlencoding::decode(raw)
            .map_err(|e| AuthError::InvalidSession(format!("bad encoding: {}", e)))?
            .into_owned(),
    };

    serde_json::from_str(&json).map_err(|e| AuthError::InvalidSession(e.to_string()))
}
