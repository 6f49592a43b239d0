//! `/authorize` and `/approve`: the approval flow.

use axum::{
    body::to_bytes,
    extract::{Request, State},
    response::Response,
};
use serde::Deserialize;

use portier_auth::RequestContext;

use crate::error::{Result, ServerError};
use crate::pages;
use crate::provider::{AuthRequest, AuthorizationMetadata, CompleteAuthorization};
use crate::return_to::{DEFAULT_RETURN_TO, LOGIN_PATH, ReturnTo, found_with_cookie, set_cookie};
use crate::state::AppState;

use super::render;

/// Action value for an explicit rejection.
pub const REJECT_ACTION: &str = "reject";

/// Label used for grants whose user has no email.
const DEFAULT_LABEL: &str = "User";

/// Fields posted by the approval screen.
///
/// `email` and `password` belong to login-and-approve forms; they are parsed
/// but not used here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveForm {
    pub action: Option<String>,
    pub oauth_req_info: Option<String>,
    pub authorize_url: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl ApproveForm {
    /// Parse a urlencoded form body.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_urlencoded::from_bytes(body).ok()
    }

    /// The pending authorization request carried by the form.
    pub fn auth_request(&self) -> Option<AuthRequest> {
        let raw = self.oauth_req_info.as_deref()?;
        AuthRequest::from_form_value(raw).ok()
    }

    pub fn is_reject(&self) -> bool {
        self.action.as_deref() == Some(REJECT_ACTION)
    }

    /// Where an explicit rejection links back to.
    pub fn back_to_authorize(&self) -> &str {
        self.authorize_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_RETURN_TO)
    }
}

/// GET /authorize
///
/// Shows the approval screen to a signed-in user. Anyone else is sent to the
/// login page with a return-to marker pointing back here.
pub async fn authorize_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response> {
    let (parts, _) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts);

    let auth_request = state
        .provider
        .parse_auth_request(&ctx)
        .await
        .map_err(|e| ServerError::InvalidAuthRequest(e.to_string()))?;

    let Some(user) = state.adapter.get_user(&ctx).await? else {
        let target = ReturnTo::current(&ctx);
        let secure = ctx.is_secure();
        tracing::info!(
            return_to = %target.as_str(),
            secure,
            "Unauthenticated authorize request, redirecting to login"
        );
        return found_with_cookie(&target.login_url(), &set_cookie(&target, secure));
    };

    tracing::debug!(
        user_id = %user.id,
        client_id = %auth_request.client_id,
        "Rendering approval screen"
    );

    let content = pages::authorize_screen_for(
        &auth_request,
        ctx.path_and_query(),
        &state.config.logo_url,
        &state.config.company_name,
    )
    .map_err(|e| ServerError::Internal(format!("Failed to serialize request: {}", e)))?;

    Ok(render(&state, &content))
}

/// POST /approve
///
/// Completes the pending authorization unless the user rejected it or is no
/// longer signed in.
pub async fn approve_handler(State(state): State<AppState>, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts);

    let body = to_bytes(body, state.config.max_body_size)
        .await
        .map_err(|_| ServerError::PayloadTooLarge)?;

    let Some(form) = ApproveForm::parse(&body) else {
        tracing::warn!("Unreadable approval form");
        return Err(ServerError::InvalidLogin);
    };
    let Some(auth_request) = form.auth_request() else {
        tracing::warn!("Approval form without a valid oauthReqInfo");
        return Err(ServerError::InvalidLogin);
    };

    let Some(user) = state.adapter.get_user(&ctx).await? else {
        tracing::info!(
            client_id = %auth_request.client_id,
            "Approval without a signed-in user, sending back to login"
        );
        return Ok(render(&state, &pages::rejected_content(LOGIN_PATH)));
    };

    if form.is_reject() {
        tracing::info!(
            user_id = %user.id,
            client_id = %auth_request.client_id,
            "Authorization rejected by user"
        );
        return Ok(render(
            &state,
            &pages::rejected_page(form.back_to_authorize(), &state.config.company_name),
        ));
    }

    let Some(session) = state.adapter.get_session(&ctx).await? else {
        tracing::info!(user_id = %user.id, "Session lapsed before approval, sending back to login");
        return Ok(render(&state, &pages::rejected_content(LOGIN_PATH)));
    };

    let props = state.adapter.authorization_props(&ctx, &user, &session);
    let client_id = auth_request.client_id.clone();
    let completion = CompleteAuthorization {
        scope: auth_request.scope.clone(),
        request: auth_request,
        user_id: user.id.clone(),
        metadata: AuthorizationMetadata {
            label: user.email.clone().unwrap_or_else(|| DEFAULT_LABEL.to_string()),
        },
        props,
    };

    let completed = state
        .provider
        .complete_authorization(completion)
        .await
        .map_err(|e| {
            tracing::error!(
                client_id = %client_id,
                user_id = %user.id,
                error = %e,
                "Completing authorization failed"
            );
            ServerError::AuthorizationFailed(e.to_string())
        })?;

    tracing::info!(user_id = %user.id, client_id = %client_id, "Authorization approved");
    Ok(render(&state, &pages::approved_content(&completed.redirect_to)))
}
