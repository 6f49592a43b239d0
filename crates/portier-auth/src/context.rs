//! Per-request view shared by adapters and the approval flow.
//!
//! Cookies are parsed once here and handed around explicitly, so the
//! return-to marker and adapter session cookies never re-parse raw headers.
//! Cookies an adapter wants to set go into a [`ResponseCookies`] sink that the
//! server drains into `Set-Cookie` headers once the response is built.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{
    HeaderMap, Method, Uri,
    header::{COOKIE, HeaderName},
    request::Parts,
    uri::Scheme,
};
use parking_lot::Mutex;

/// Header set by TLS-terminating proxies to describe the client transport.
pub const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

// ─────────────────────────────────────────────────────────────────────────────
// Cookies
// ─────────────────────────────────────────────────────────────────────────────

/// Cookies sent with a request, keyed by name.
///
/// Parsing never fails: pairs without `=` or with an empty name are dropped,
/// and the first occurrence of a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    /// Parse a single `Cookie` header value.
    pub fn parse(header: &str) -> Self {
        let mut cookies = Self::default();
        cookies.extend_from(header);
        cookies
    }

    /// Collect cookies from every `Cookie` header in the map.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = Self::default();
        for value in headers.get_all(COOKIE) {
            if let Ok(value) = value.to_str() {
                cookies.extend_from(value);
            }
        }
        cookies
    }

    fn extend_from(&mut self, header: &str) {
        for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            self.0
                .entry(name.to_string())
                .or_insert_with(|| value.trim().to_string());
        }
    }

    /// Look up a cookie value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response cookies
// ─────────────────────────────────────────────────────────────────────────────

/// A cookie to set on the response, scoped to the whole site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCookie {
    pub name: String,
    pub value: String,
    pub max_age: Option<u64>,
    pub http_only: bool,
    pub secure: bool,
}

impl ResponseCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            http_only: false,
            secure: false,
        }
    }

    /// A cookie that expires `name` immediately.
    pub fn removal(name: impl Into<String>) -> Self {
        Self::new(name, "").with_max_age(0)
    }

    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn is_removal(&self) -> bool {
        self.max_age == Some(0)
    }

    /// Render as a `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        let mut header = format!("{}={}; Path=/; SameSite=Lax", self.name, self.value);
        if let Some(max_age) = self.max_age {
            header.push_str(&format!("; Max-Age={}", max_age));
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }
}

/// Shared sink for cookies set while handling one request.
///
/// Clones share the same list, so the server can keep one handle in the
/// request extensions and drain it after the handler ran.
#[derive(Debug, Clone, Default)]
pub struct ResponseCookies(Arc<Mutex<Vec<ResponseCookie>>>);

impl ResponseCookies {
    pub fn push(&self, cookie: ResponseCookie) {
        self.0.lock().push(cookie);
    }

    /// The most recent cookie set under `name`.
    pub fn latest(&self, name: &str) -> Option<ResponseCookie> {
        self.0.lock().iter().rev().find(|c| c.name == name).cloned()
    }

    /// Copy of everything set so far.
    pub fn snapshot(&self) -> Vec<ResponseCookie> {
        self.0.lock().clone()
    }

    /// Remove and return everything set so far.
    pub fn take(&self) -> Vec<ResponseCookie> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RequestContext
// ─────────────────────────────────────────────────────────────────────────────

/// Everything an adapter may inspect about the inbound request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    cookies: Cookies,
    response_cookies: ResponseCookies,
}

impl RequestContext {
    /// Build a context from request parts.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        let cookies = Cookies::from_headers(&headers);
        Self {
            method,
            uri,
            headers,
            cookies,
            response_cookies: ResponseCookies::default(),
        }
    }

    /// Build a context from axum request parts.
    ///
    /// A [`ResponseCookies`] sink found in the request extensions is shared
    /// with the context; otherwise the context gets a private one.
    pub fn from_parts(parts: &Parts) -> Self {
        let mut ctx = Self::new(parts.method.clone(), parts.uri.clone(), parts.headers.clone());
        if let Some(sink) = parts.extensions.get::<ResponseCookies>() {
            ctx.response_cookies = sink.clone();
        }
        ctx
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    /// Get a header value as a string, if present and valid UTF-8.
    pub fn header<K: TryInto<HeaderName>>(&self, name: K) -> Option<&str> {
        let name = name.try_into().ok()?;
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a cookie value by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name)
    }

    /// Queue a cookie for the response.
    pub fn set_cookie(&self, cookie: ResponseCookie) {
        self.response_cookies.push(cookie);
    }

    /// Cookies queued for the response so far.
    pub fn response_cookies(&self) -> &ResponseCookies {
        &self.response_cookies
    }

    /// Value of cookie `name` as the browser will hold it after this response.
    ///
    /// A cookie set during this request wins over the inbound one; a removed
    /// cookie reads as absent.
    pub fn current_cookie(&self, name: &str) -> Option<String> {
        match self.response_cookies.latest(name) {
            Some(cookie) if cookie.is_removal() => None,
            Some(cookie) => Some(cookie.value),
            None => self.cookie(name).map(str::to_string),
        }
    }

    /// Request path without the query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Request path plus `?query` when a query is present.
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    /// First value of a query parameter, form-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// First value of a query parameter exactly as it appears on the wire.
    pub fn raw_query_param(&self, name: &str) -> Option<&str> {
        self.uri.query()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }

    /// Whether the client reached us over an encrypted transport.
    pub fn is_secure(&self) -> bool {
        if self.uri.scheme() == Some(&Scheme::HTTPS) {
            return true;
        }
        self.header(FORWARDED_PROTO_HEADER)
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn context(uri: &str, headers: &[(&str, &str)]) -> RequestContext {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        RequestContext::from_parts(&parts)
    }

    #[test]
    fn test_cookie_parse_basic() {
        let cookies = Cookies::parse("a=1; b=two ;c= 3");
        assert_eq!(cookies.get("a"), Some("1"));
        assert_eq!(cookies.get("b"), Some("two"));
        assert_eq!(cookies.get("c"), Some("3"));
        assert_eq!(cookies.len(), 3);
    }

    #[test]
    fn test_cookie_parse_first_occurrence_wins() {
        let cookies = Cookies::parse("return_to=first; return_to=second");
        assert_eq!(cookies.get("return_to"), Some("first"));
    }

    #[test]
    fn test_cookie_parse_splits_on_first_equals() {
        let cookies = Cookies::parse("token=abc=def==");
        assert_eq!(cookies.get("token"), Some("abc=def=="));
    }

    #[test]
    fn test_cookie_parse_drops_malformed_pairs() {
        let cookies = Cookies::parse(";;garbage; =nameless; ok=1;");
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies.get("ok"), Some("1"));
        assert!(Cookies::parse("").is_empty());
    }

    #[test]
    fn test_cookies_from_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1"));
        headers.append(COOKIE, HeaderValue::from_static("b=2; a=3"));
        let cookies = Cookies::from_headers(&headers);
        assert_eq!(cookies.get("a"), Some("1"));
        assert_eq!(cookies.get("b"), Some("2"));
    }

    #[test]
    fn test_path_and_query() {
        let ctx = context("/authorize?client_id=abc", &[]);
        assert_eq!(ctx.path(), "/authorize");
        assert_eq!(ctx.path_and_query(), "/authorize?client_id=abc");

        let ctx = context("/plain", &[]);
        assert_eq!(ctx.path_and_query(), "/plain");
    }

    #[test]
    fn test_query_params() {
        let ctx = context("/x?redirect=%2Fa%3Fb%3D1&redirect=ignored&flag", &[]);
        assert_eq!(ctx.query_param("redirect").as_deref(), Some("/a?b=1"));
        assert_eq!(ctx.raw_query_param("redirect"), Some("%2Fa%3Fb%3D1"));
        assert_eq!(ctx.raw_query_param("flag"), Some(""));
        assert_eq!(ctx.query_param("missing"), None);
    }

    #[test]
    fn test_is_secure() {
        assert!(!context("/x", &[]).is_secure());
        assert!(context("https://gate.example/x", &[]).is_secure());
        assert!(context("/x", &[("x-forwarded-proto", "HTTPS, http")]).is_secure());
        assert!(!context("/x", &[("x-forwarded-proto", "http")]).is_secure());
    }

    #[test]
    fn test_response_cookie_header_value() {
        let cookie = ResponseCookie::new("sid", "abc")
            .with_max_age(60)
            .with_http_only(true)
            .with_secure(true);
        assert_eq!(
            cookie.header_value(),
            "sid=abc; Path=/; SameSite=Lax; Max-Age=60; HttpOnly; Secure"
        );
        assert_eq!(
            ResponseCookie::removal("sid").header_value(),
            "sid=; Path=/; SameSite=Lax; Max-Age=0"
        );
    }

    #[test]
    fn test_current_cookie_prefers_response_value() {
        let ctx = context("/x", &[("cookie", "sid=old; keep=1")]);
        assert_eq!(ctx.current_cookie("sid").as_deref(), Some("old"));

        ctx.set_cookie(ResponseCookie::new("sid", "new"));
        ctx.set_cookie(ResponseCookie::removal("keep"));
        assert_eq!(ctx.current_cookie("sid").as_deref(), Some("new"));
        assert_eq!(ctx.current_cookie("keep"), None);
        assert_eq!(ctx.cookie("sid"), Some("old"));
        assert_eq!(ctx.response_cookies().snapshot().len(), 2);
    }

    #[test]
    fn test_context_shares_sink_from_extensions() {
        let sink = ResponseCookies::default();
        let mut request = Request::builder().uri("/x").body(()).unwrap();
        request.extensions_mut().insert(sink.clone());
        let (parts, _) = request.into_parts();

        let ctx = RequestContext::from_parts(&parts);
        ctx.set_cookie(ResponseCookie::new("a", "1"));
        assert_eq!(sink.take(), vec![ResponseCookie::new("a", "1")]);
        assert!(ctx.response_cookies().is_empty());
    }

    #[test]
    fn test_header_lookup() {
        let ctx = context("/x", &[("x-user-id", "u1"), ("cookie", "sid=9")]);
        assert_eq!(ctx.header("x-user-id"), Some("u1"));
        assert_eq!(ctx.header("x-missing"), None);
        assert_eq!(ctx.cookie("sid"), Some("9"));
    }
}
