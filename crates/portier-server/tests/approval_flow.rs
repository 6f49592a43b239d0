//! End-to-end approval flow against a running server.

mod common;

use anyhow::Result;
use reqwest::{StatusCode, header};
use url::Url;
use wiremock::matchers::{header as header_is, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use portier_server::AuthRequest;

use common::{TestServer, hidden_field, script_redirect};

const AUTHORIZE: &str = "/authorize?response_type=code&client_id=abc\
    &redirect_uri=https%3A%2F%2Fclient.example%2Fcb&scope=read&state=s1";

fn signed_in(builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    builder
        .header("x-user-id", "user-1")
        .header("x-user-email", "ada@example.com")
        .header("x-access-token", "at-1")
        .header("x-refresh-token", "rt-1")
}

#[tokio::test]
async fn test_full_approval_flow() -> Result<()> {
    let server = TestServer::start().await?;

    Mock::given(method("GET"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form>upstream login</form>"))
        .expect(1)
        .mount(&server.upstream)
        .await;

    // Signed out: sent to login with a return-to marker.
    let resp = server.get(AUTHORIZE).send().await?;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = resp.headers()[header::LOCATION].to_str()?.to_string();
    assert!(location.starts_with("/auth/login?redirect=%2Fauthorize%3Fresponse_type%3Dcode"));
    let cookie = resp.headers()[header::SET_COOKIE].to_str()?.to_string();
    let marker = cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .to_string();
    assert!(marker.starts_with("return_to=%2Fauthorize"));

    // The login page comes from upstream.
    let resp = server.get(&location).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await?, "<form>upstream login</form>");

    // Signed in: bounced back to the original authorize URL.
    let resp = signed_in(server.get("/auth/login"))
        .header(header::COOKIE, &marker)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[header::LOCATION], AUTHORIZE);
    assert!(resp.headers()[header::SET_COOKIE].to_str()?.contains("Max-Age=0"));

    // Approval screen carries the pending request.
    let resp = signed_in(server.get(AUTHORIZE)).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = resp.text().await?;
    let request_json = hidden_field(&page, "oauthReqInfo").expect("oauthReqInfo field");
    let authorize_url = hidden_field(&page, "authorizeUrl").expect("authorizeUrl field");
    assert_eq!(authorize_url, AUTHORIZE);

    let request = AuthRequest::from_form_value(&request_json)?;
    assert_eq!(request.client_id, "abc");
    assert_eq!(request.scope, vec!["read"]);

    // Approve.
    let resp = signed_in(server.post("/approve"))
        .form(&[
            ("action", "approve"),
            ("oauthReqInfo", request_json.as_str()),
            ("authorizeUrl", authorize_url.as_str()),
        ])
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = resp.text().await?;
    assert!(page.contains("Authorization approved!"));

    let redirect = Url::parse(&script_redirect(&page).expect("redirect script"))?;
    assert_eq!(redirect.host_str(), Some("client.example"));
    let code = redirect
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .expect("code");
    assert!(redirect.query_pairs().any(|(k, v)| k == "state" && v == "s1"));

    // The grant carries the adapter's props.
    let grant = server.provider.redeem_code(&code, None).await?;
    assert_eq!(grant.user_id, "user-1");
    assert_eq!(grant.label, "ada@example.com");
    assert_eq!(grant.props.access_token, "at-1");
    assert_eq!(grant.props.refresh_token, "rt-1");
    assert_eq!(grant.props.extra_str("clientId"), Some("downstream"));

    // Refresh keeps the props round-tripping through the adapter.
    let refreshed = server
        .provider
        .refresh_grant(grant.id, server.adapter.as_ref())
        .await?;
    assert_eq!(refreshed, grant.props);

    Ok(())
}

#[tokio::test]
async fn test_reject_does_not_create_grant() -> Result<()> {
    let server = TestServer::start().await?;

    let page = signed_in(server.get(AUTHORIZE)).send().await?.text().await?;
    let request_json = hidden_field(&page, "oauthReqInfo").expect("oauthReqInfo field");

    let resp = signed_in(server.post("/approve"))
        .form(&[
            ("action", "reject"),
            ("oauthReqInfo", request_json.as_str()),
            ("authorizeUrl", AUTHORIZE),
        ])
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::OK);
    let page = resp.text().await?;
    assert_eq!(hidden_field(&page, "oauthReqInfo"), None);
    assert!(page.contains("Go back to authorize"));
    assert_eq!(server.provider.grant_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_catch_all_proxies_and_strips_host() -> Result<()> {
    let server = TestServer::start().await?;

    Mock::given(method("PUT"))
        .and(path("/some/api/path"))
        .and(query_param("a", "1"))
        .and(header_is("x-trace", "t-1"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("x-upstream", "yes")
                .set_body_string("accepted"),
        )
        .expect(1)
        .mount(&server.upstream)
        .await;

    let resp = server
        .client
        .put(format!("{}/some/api/path?a=1", server.base_url()))
        .header("x-trace", "t-1")
        .body("payload")
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(resp.headers()["x-upstream"], "yes");
    assert_eq!(resp.text().await?, "accepted");

    let received = server.upstream.received_requests().await.unwrap_or_default();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body, b"payload");
    let host = received[0]
        .headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert_ne!(host, server.addr.to_string());
    Ok(())
}

#[tokio::test]
async fn test_well_known_is_not_proxied() -> Result<()> {
    let server = TestServer::start().await?;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server.upstream)
        .await;

    let resp = signed_in(server.get("/.well-known/oauth-authorization-server"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_invalid_approval_form_is_401() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = signed_in(server.post("/approve"))
        .form(&[("action", "approve"), ("oauthReqInfo", "{broken")])
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.text().await?, "INVALID LOGIN");
    Ok(())
}
