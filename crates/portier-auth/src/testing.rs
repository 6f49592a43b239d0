//! Scripted adapter for exercising the approval flow in tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::adapter::AuthAdapter;
use crate::context::{RequestContext, ResponseCookie};
use crate::error::{AuthError, Result};
use crate::types::{AuthSession, AuthUser, AuthorizationProps, TokenExchange, TokenExchangeResult};

/// Adapter returning fixed answers and recording how often it was asked.
#[derive(Debug, Default)]
pub struct MockAdapter {
    user: Option<AuthUser>,
    session: Option<AuthSession>,
    fail_user_lookup: bool,
    exchange_result: Option<TokenExchangeResult>,
    response_cookie: Option<ResponseCookie>,
    user_calls: Mutex<usize>,
    exchanges: Mutex<Vec<TokenExchange>>,
}

impl MockAdapter {
    /// An adapter that never recognizes anyone.
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// An adapter that recognizes `user` with `session`.
    pub fn signed_in(user: AuthUser, session: Option<AuthSession>) -> Self {
        Self {
            user: Some(user),
            session,
            ..Self::default()
        }
    }

    /// An adapter whose user lookup fails with a backend error.
    pub fn failing() -> Self {
        Self {
            fail_user_lookup: true,
            ..Self::default()
        }
    }

    /// Answer token exchanges with `result`.
    pub fn with_exchange_result(mut self, result: TokenExchangeResult) -> Self {
        self.exchange_result = Some(result);
        self
    }

    /// Queue `cookie` on the response whenever the user is looked up.
    pub fn with_response_cookie(mut self, cookie: ResponseCookie) -> Self {
        self.response_cookie = Some(cookie);
        self
    }

    /// Number of `get_user` calls so far.
    pub fn user_calls(&self) -> usize {
        *self.user_calls.lock()
    }

    /// Token exchanges received so far.
    pub fn exchanges(&self) -> Vec<TokenExchange> {
        self.exchanges.lock().clone()
    }
}

#[async_trait]
impl AuthAdapter for MockAdapter {
    async fn get_user(&self, ctx: &RequestContext) -> Result<Option<AuthUser>> {
        *self.user_calls.lock() += 1;
        if let Some(cookie) = &self.response_cookie {
            ctx.set_cookie(cookie.clone());
        }
        if self.fail_user_lookup {
            return Err(AuthError::Backend("mock user lookup failure".to_string()));
        }
        Ok(self.user.clone())
    }

    async fn get_session(&self, _ctx: &RequestContext) -> Result<Option<AuthSession>> {
        Ok(self.session.clone())
    }

    fn authorization_props(
        &self,
        _ctx: &RequestContext,
        user: &AuthUser,
        session: &AuthSession,
    ) -> AuthorizationProps {
        AuthorizationProps::new(user, session).with_extra("adapter", "mock")
    }

    async fn token_exchange_callback(
        &self,
        exchange: &TokenExchange,
    ) -> Option<TokenExchangeResult> {
        self.exchanges.lock().push(exchange.clone());
        if !exchange.is_refresh() {
            return None;
        }
        self.exchange_result.clone()
    }
}
