//! Adapter cookie middleware.
//!
//! Adapters queue cookies on the [`RequestContext`](portier_auth::RequestContext)
//! (a refreshed session, for instance). This layer hands every request a
//! shared [`ResponseCookies`] sink and turns whatever ended up in it into
//! `Set-Cookie` headers, whichever branch produced the response.

use axum::{
    extract::Request,
    http::{HeaderValue, header::SET_COOKIE},
    middleware::Next,
    response::Response,
};

use portier_auth::ResponseCookies;

/// Attach a cookie sink to the request and flush it into the response.
pub async fn adapter_cookies(mut request: Request, next: Next) -> Response {
    let sink = ResponseCookies::default();
    request.extensions_mut().insert(sink.clone());

    let mut response = next.run(request).await;

    for cookie in sink.take() {
        match HeaderValue::from_str(&cookie.header_value()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => {
                tracing::warn!(cookie = %cookie.name, error = %e, "Dropping unencodable adapter cookie");
            }
        }
    }
    response
}
