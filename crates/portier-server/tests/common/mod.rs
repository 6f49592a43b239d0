//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use reqwest::{Client, redirect::Policy};
use tokio::sync::oneshot;
use url::Url;
use wiremock::MockServer;

use portier_auth::{HeaderAdapter, HeaderAdapterConfig};
use portier_server::{AppState, LocalProvider, Server, ServerConfig};

/// A portier instance running in the background in front of a mock upstream.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client that never follows redirects.
    pub client: Client,
    /// The provider behind the server, for inspecting grants.
    pub provider: Arc<LocalProvider>,
    /// The adapter behind the server.
    pub adapter: Arc<HeaderAdapter>,
    /// Mock upstream the proxy forwards to.
    pub upstream: MockServer,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Start a server with a header-trust adapter and an open local provider.
    pub async fn start() -> Result<Self> {
        let upstream = MockServer::start().await;

        let config = ServerConfig::new(
            "https://cdn.example.com/logo.png",
            "Acme",
            Url::parse(&upstream.uri())?,
        )
        .with_bind_address(SocketAddr::from(([127, 0, 0, 1], 0)))
        .with_request_logging(false);

        let adapter = Arc::new(HeaderAdapter::new(HeaderAdapterConfig {
            provider_base_url: Some("https://api.example.com".to_string()),
            client_id: Some("downstream".to_string()),
        }));
        let provider = Arc::new(LocalProvider::new());

        let state = AppState::new(adapter.clone(), provider.clone(), config)?;
        let (tx, rx) = oneshot::channel::<()>();
        let addr = Server::new(state)
            .run_with_shutdown(async move {
                let _ = rx.await;
            })
            .await?;

        let client = Client::builder().redirect(Policy::none()).build()?;

        Ok(Self {
            addr,
            client,
            provider,
            adapter,
            upstream,
            shutdown: Some(tx),
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// GET request builder.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    /// POST request builder.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Value of a hidden form field in a rendered page, HTML-unescaped.
pub fn hidden_field(page: &str, name: &str) -> Option<String> {
    let marker = format!(r#"name="{}" value=""#, name);
    let start = page.find(&marker)? + marker.len();
    let end = page[start..].find('"')? + start;
    Some(html_escape::decode_html_entities(&page[start..end]).into_owned())
}

/// Target of the timed redirect script in a status page.
pub fn script_redirect(page: &str) -> Option<String> {
    let marker = "window.location.href = ";
    let start = page.find(marker)? + marker.len();
    let end = page[start..].find(';')? + start;
    serde_json::from_str(&page[start..end].replace("<\\/", "</")).ok()
}
