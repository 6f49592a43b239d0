//! Authentication adapter contract for the portier approval front end.
//!
//! The approval flow never talks to an identity backend directly. It asks an
//! [`AuthAdapter`] who the current user is, which session they hold and which
//! properties should be bound to the token the OAuth provider is about to mint.
//!
//! # Components
//!
//! - [`adapter`]: the [`AuthAdapter`] trait
//! - [`context`]: [`RequestContext`], the per-request view adapters read from
//!   and queue response cookies on
//! - [`types`]: users, sessions, authorization props and token exchange values
//! - [`adapters`]: reference backends: Supabase SSR cookies and trusted headers

pub mod adapter;
pub mod adapters;
pub mod context;
pub mod error;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapter::{AuthAdapter, SharedAuthAdapter};
pub use adapters::{HeaderAdapter, HeaderAdapterConfig, SupabaseAdapter, SupabaseConfig};
pub use context::{Cookies, RequestContext, ResponseCookie, ResponseCookies};
pub use error::{AuthError, Result};
pub use types::{
    AuthSession, AuthUser, AuthorizationProps, REFRESH_TOKEN_GRANT, TokenExchange,
    TokenExchangeResult,
};
