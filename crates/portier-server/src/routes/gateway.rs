//! Catch-all gateway: return-to bounce or transparent proxy.

use axum::{
    extract::{Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};

use portier_auth::RequestContext;

use crate::error::Result;
use crate::return_to::{ReturnTo, bounce};
use crate::state::AppState;

/// Metadata discovery paths are never proxied.
pub const WELL_KNOWN_PREFIX: &str = "/.well-known";

/// ANY fallback
pub async fn gateway_handler(State(state): State<AppState>, request: Request) -> Result<Response> {
    if request.uri().path().starts_with(WELL_KNOWN_PREFIX) {
        return Ok((StatusCode::NOT_FOUND, [(CONTENT_TYPE, "text/plain")]).into_response());
    }

    let (parts, body) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts);

    if let Some(target) = pending_return_to(&state, &ctx).await {
        tracing::info!(return_to = %target.as_str(), "Authenticated with return-to, redirecting");
        return bounce(&target, ctx.is_secure());
    }

    state
        .forwarder
        .forward(Request::from_parts(parts, body))
        .await
}

/// Return-to target for a signed-in user, if one is pending.
///
/// Lookup failures are logged and treated as "nothing pending".
async fn pending_return_to(state: &AppState, ctx: &RequestContext) -> Option<ReturnTo> {
    let target = ReturnTo::pending(ctx)?;
    match state.adapter.get_user(ctx).await {
        Ok(Some(_)) => Some(target),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(path = %ctx.path(), error = %e, "Return-to check failed, proxying");
            None
        }
    }
}
