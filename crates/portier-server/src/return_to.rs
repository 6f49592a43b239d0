//! Return-to marker: where the user was headed before being sent to log in.
//!
//! The marker travels URL-encoded, in the `return_to` cookie and in the
//! `redirect` query parameter of the login URL. [`ReturnTo`] always holds the
//! decoded target.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use portier_auth::RequestContext;

use crate::error::{Result, ServerError};

/// Cookie holding the encoded return-to target.
pub const RETURN_TO_COOKIE: &str = "return_to";

/// Query parameter carrying the encoded return-to target.
pub const REDIRECT_PARAM: &str = "redirect";

/// Where an authenticated user lands when no marker exists.
pub const DEFAULT_RETURN_TO: &str = "/authorize";

/// Login route, proxied to the upstream while the user is unauthenticated.
pub const LOGIN_PATH: &str = "/auth/login";

/// A decoded return-to target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnTo(String);

impl ReturnTo {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    /// Decode an encoded marker value. Empty or undecodable values are absent.
    pub fn decode(encoded: &str) -> Option<Self> {
        match urlencoding::decode(encoded) {
            Ok(target) if !target.is_empty() => Some(Self(target.into_owned())),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Discarding undecodable return-to marker");
                None
            }
        }
    }

    /// Marker from the `return_to` cookie.
    pub fn from_cookie(ctx: &RequestContext) -> Option<Self> {
        ctx.cookie(RETURN_TO_COOKIE).and_then(Self::decode)
    }

    /// Marker from the `redirect` query parameter.
    pub fn from_query(ctx: &RequestContext) -> Option<Self> {
        ctx.raw_query_param(REDIRECT_PARAM).and_then(Self::decode)
    }

    /// Pending marker, cookie first, then query parameter.
    pub fn pending(ctx: &RequestContext) -> Option<Self> {
        Self::from_cookie(ctx).or_else(|| Self::from_query(ctx))
    }

    /// Pending marker, falling back to [`DEFAULT_RETURN_TO`].
    pub fn resolve(ctx: &RequestContext) -> Self {
        Self::pending(ctx).unwrap_or_else(|| Self::new(DEFAULT_RETURN_TO))
    }

    /// The target of the request itself: its path and query.
    pub fn current(ctx: &RequestContext) -> Self {
        Self::new(ctx.path_and_query())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL-encoded form used in the cookie and query parameter.
    pub fn encoded(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }

    /// Login URL carrying this marker.
    pub fn login_url(&self) -> String {
        format!("{}?{}={}", LOGIN_PATH, REDIRECT_PARAM, self.encoded())
    }
}

/// `Set-Cookie` value storing `target` for the whole site.
pub fn set_cookie(target: &ReturnTo, secure: bool) -> String {
    with_secure(
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            RETURN_TO_COOKIE,
            target.encoded()
        ),
        secure,
    )
}

/// `Set-Cookie` value expiring the marker immediately.
pub fn clear_cookie(secure: bool) -> String {
    with_secure(
        format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", RETURN_TO_COOKIE),
        secure,
    )
}

fn with_secure(mut cookie: String, secure: bool) -> String {
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Percent-encode every byte of `target` outside visible ASCII so it fits in
/// a `Location` header. Existing escapes are left alone.
pub fn header_safe(target: &str) -> String {
    let mut out = String::with_capacity(target.len());
    for byte in target.bytes() {
        if byte.is_ascii_graphic() {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// A 302 to `location` that also sets `cookie`.
pub fn found_with_cookie(location: &str, cookie: &str) -> Result<Response> {
    let location = header_safe(location);
    let location = HeaderValue::from_str(&location)
        .map_err(|e| ServerError::InvalidRedirect(format!("{}: {}", location, e)))?;
    let cookie = HeaderValue::from_str(cookie)
        .map_err(|e| ServerError::Internal(format!("Invalid cookie header: {}", e)))?;

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, location), (header::SET_COOKIE, cookie)],
    )
        .into_response())
}

/// Send the user to `target` and expire the marker in the same response.
pub fn bounce(target: &ReturnTo, secure: bool) -> Result<Response> {
    found_with_cookie(target.as_str(), &clear_cookie(secure))
}
