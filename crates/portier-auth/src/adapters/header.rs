//! Header-trust adapter for trusted networks and local testing.
//!
//! Identity is taken verbatim from request headers set by a trusted hop in
//! front of portier. Never expose this adapter to the open internet.

use async_trait::async_trait;

use crate::adapter::AuthAdapter;
use crate::context::RequestContext;
use crate::error::Result;
use crate::types::{AuthSession, AuthUser, AuthorizationProps, TokenExchange, TokenExchangeResult};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// Extra values the header adapter binds to issued tokens.
#[derive(Debug, Clone, Default)]
pub struct HeaderAdapterConfig {
    /// Base URL of the API the tokens are meant for (`providerBaseUrl` prop).
    pub provider_base_url: Option<String>,
    /// Client id of the downstream API (`clientId` prop).
    pub client_id: Option<String>,
}

/// Adapter that trusts `x-user-*` and `x-*-token` headers.
#[derive(Debug, Clone, Default)]
pub struct HeaderAdapter {
    config: HeaderAdapterConfig,
}

impl HeaderAdapter {
    pub fn new(config: HeaderAdapterConfig) -> Self {
        Self { config }
    }
}

fn non_empty<'a>(ctx: &'a RequestContext, name: &str) -> Option<&'a str> {
    ctx.header(name).filter(|v| !v.is_empty())
}

#[async_trait]
impl AuthAdapter for HeaderAdapter {
    async fn get_user(&self, ctx: &RequestContext) -> Result<Option<AuthUser>> {
        let Some(id) = non_empty(ctx, USER_ID_HEADER) else {
            return Ok(None);
        };
        let email = ctx.header(USER_EMAIL_HEADER).map(str::to_string);
        Ok(Some(AuthUser::new(id, email)))
    }

    async fn get_session(&self, ctx: &RequestContext) -> Result<Option<AuthSession>> {
        let Some(access_token) = non_empty(ctx, ACCESS_TOKEN_HEADER) else {
            return Ok(None);
        };
        let refresh_token = ctx.header(REFRESH_TOKEN_HEADER).unwrap_or_default();
        Ok(Some(AuthSession::new(access_token, refresh_token)))
    }

    fn authorization_props(
        &self,
        _ctx: &RequestContext,
        user: &AuthUser,
        session: &AuthSession,
    ) -> AuthorizationProps {
        let mut props = AuthorizationProps::new(user, session);
        if let Some(base_url) = &self.config.provider_base_url {
            props = props.with_extra("providerBaseUrl", base_url.clone());
        }
        if let Some(client_id) = &self.config.client_id {
            props = props.with_extra("clientId", client_id.clone());
        }
        props
    }

    /// There is no backend to refresh against, so the current tokens are
    /// carried forward unchanged.
    async fn token_exchange_callback(
        &self,
        exchange: &TokenExchange,
    ) -> Option<TokenExchangeResult> {
        if !exchange.is_refresh() || exchange.props.refresh_token.is_empty() {
            return None;
        }
        let props = &exchange.props;
        Some(TokenExchangeResult::rotated(
            props,
            props.access_token.clone(),
            props.refresh_token.clone(),
        ))
    }
}
