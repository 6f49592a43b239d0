//! The adapter contract every identity backend implements.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::Result;
use crate::types::{AuthSession, AuthUser, AuthorizationProps, TokenExchange, TokenExchangeResult};

/// Shared handle to the adapter configured for this process.
pub type SharedAuthAdapter = Arc<dyn AuthAdapter>;

/// Identity backend behind the approval flow.
///
/// `Ok(None)` from [`get_user`](AuthAdapter::get_user) or
/// [`get_session`](AuthAdapter::get_session) means "not authenticated" and is
/// a normal flow branch. An `Err` is fatal to the request that asked, except in
/// the gateway's return-to check where it is logged and ignored.
#[async_trait]
pub trait AuthAdapter: Send + Sync + std::fmt::Debug {
    /// Identify the user behind this request.
    async fn get_user(&self, ctx: &RequestContext) -> Result<Option<AuthUser>>;

    /// Fetch the current session. Only called after `get_user` found a user;
    /// may still be `None` if the session lapsed in between.
    async fn get_session(&self, ctx: &RequestContext) -> Result<Option<AuthSession>>;

    /// Build the props bound to the token the provider is about to mint.
    ///
    /// Must not fail; implementations fall back to best-effort values.
    /// The result must contain the user id and both session tokens.
    fn authorization_props(
        &self,
        ctx: &RequestContext,
        user: &AuthUser,
        session: &AuthSession,
    ) -> AuthorizationProps;

    /// React to a provider token exchange.
    ///
    /// `None` means "no change". Backend failures degrade to `None` instead
    /// of failing the provider's token issuance.
    async fn token_exchange_callback(
        &self,
        exchange: &TokenExchange,
    ) -> Option<TokenExchangeResult> {
        let _ = exchange;
        None
    }
}
