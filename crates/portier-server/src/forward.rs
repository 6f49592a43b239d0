//! Reverse proxy forwarder.
//!
//! Replays an inbound request against the proxy target's origin at the same
//! path and query, and streams the upstream response back unmodified,
//! including a non-canonical reason phrase.

use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{Method, header::HOST},
    response::Response,
};
use futures::StreamExt;
use hyper::ext::ReasonPhrase;
use reqwest::{Client, redirect::Policy};
use url::Url;

use crate::error::{Result, ServerError};

/// Forwards requests to a fixed upstream origin.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    target: Url,
    max_body_size: usize,
}

impl Forwarder {
    /// Create a forwarder for `target`. Upstream redirects are passed through
    /// to the caller, never followed.
    pub fn new(target: Url, max_body_size: usize) -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| ServerError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, target, max_body_size))
    }

    /// Create with a caller-supplied client.
    pub fn with_client(client: Client, target: Url, max_body_size: usize) -> Self {
        Self {
            client,
            target,
            max_body_size,
        }
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Upstream URL for an inbound path and query.
    pub fn target_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.target.origin().ascii_serialization(), path_and_query)
    }

    /// Forward `request` upstream and relay the response.
    pub async fn forward(&self, request: Request) -> Result<Response> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = self.target_url(path_and_query);

        let mut headers = parts.headers.clone();
        headers.remove(HOST);

        let mut outbound = self
            .client
            .request(parts.method.clone(), &url)
            .headers(headers);

        if parts.method != Method::GET && parts.method != Method::HEAD {
            let body = to_bytes(body, self.max_body_size).await.map_err(|e| {
                tracing::warn!(error = %e, "Rejecting inbound body");
                ServerError::PayloadTooLarge
            })?;
            outbound = outbound.body(body);
        }

        tracing::debug!(method = %parts.method, url = %url, "Forwarding request");

        let upstream = outbound.send().await.map_err(|e| {
            tracing::error!(method = %parts.method, url = %url, error = %e, "Forwarding failed");
            ServerError::Upstream(e.to_string())
        })?;

        let status = upstream.status();
        let headers = upstream.headers().clone();
        let reason = upstream.extensions().get::<ReasonPhrase>().cloned();
        let stream = upstream
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other));

        let mut response = Response::new(Body::from_stream(stream));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        if let Some(reason) = reason {
            response.extensions_mut().insert(reason);
        }
        Ok(response)
    }
}
