//! `/auth/login`: upstream login page, or the way back once signed in.

use axum::{
    extract::{Request, State},
    response::Response,
};

use portier_auth::RequestContext;

use crate::error::Result;
use crate::return_to::{ReturnTo, bounce};
use crate::state::AppState;

/// ANY /auth/login
pub async fn login_handler(State(state): State<AppState>, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts);

    match state.adapter.get_user(&ctx).await? {
        None => {
            tracing::info!(
                method = %parts.method,
                path = %ctx.path_and_query(),
                "Unauthenticated, proxying login"
            );
            state
                .forwarder
                .forward(Request::from_parts(parts, body))
                .await
        }
        Some(user) => {
            let target = ReturnTo::resolve(&ctx);
            tracing::info!(
                user_id = %user.id,
                return_to = %target.as_str(),
                "Authenticated, redirecting back"
            );
            bounce(&target, ctx.is_secure())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use portier_auth::{AuthUser, testing::MockAdapter};

    use crate::provider::mock::MockProvider;
    use crate::routes::test_support::{body_string, router, router_with_target, send};

    fn signed_in() -> Arc<MockAdapter> {
        Arc::new(MockAdapter::signed_in(AuthUser::new("user-1", None), None))
    }

    #[tokio::test]
    async fn test_login_bounces_to_cookie_target() {
        let response = send(
            router(signed_in(), Arc::new(MockProvider::new())),
            Request::builder()
                .uri("/auth/login?redirect=%2Ffrom-query")
                .header(header::COOKIE, "other=1; return_to=%2Fauthorize%3Fclient_id%3Dabc")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/authorize?client_id=abc");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("return_to=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_login_falls_back_to_query_then_default() {
        let response = send(
            router(signed_in(), Arc::new(MockProvider::new())),
            Request::builder()
                .uri("/auth/login?redirect=%2Fauthorize%3Fclient_id%3Dq")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.headers()[header::LOCATION], "/authorize?client_id=q");

        let response = send(
            router(signed_in(), Arc::new(MockProvider::new())),
            Request::builder().uri("/auth/login").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/authorize");
    }

    #[tokio::test]
    async fn test_login_unauthenticated_proxies_upstream() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/login"))
            .and(query_param("redirect", "/authorize?client_id=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<form>login</form>"))
            .expect(1)
            .mount(&upstream)
            .await;

        let response = send(
            router_with_target(
                Arc::new(MockAdapter::signed_out()),
                Arc::new(MockProvider::new()),
                &upstream.uri(),
            ),
            Request::builder()
                .uri("/auth/login?redirect=%2Fauthorize%3Fclient_id%3Dabc")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<form>login</form>");
    }

    #[tokio::test]
    async fn test_login_post_is_proxied_too() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(303).insert_header("location", "/auth/login"))
            .expect(1)
            .mount(&upstream)
            .await;

        let response = send(
            router_with_target(
                Arc::new(MockAdapter::signed_out()),
                Arc::new(MockProvider::new()),
                &upstream.uri(),
            ),
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .body(Body::from("email=a&password=b"))
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn test_login_proxy_failure_is_generic_500() {
        let response = send(
            router(Arc::new(MockAdapter::signed_out()), Arc::new(MockProvider::new())),
            Request::builder().uri("/auth/login").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "Internal Server Error");
    }
}
