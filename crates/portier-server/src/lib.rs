//! OAuth authorization-approval front end and reverse proxy.
//!
//! Sits in front of an existing web application. It renders the consent
//! screens of an OAuth authorization flow, delegates identity to an
//! [`AuthAdapter`](portier_auth::AuthAdapter), and transparently proxies the
//! login page and every other path to the upstream application.
//!
//! # Routes
//!
//! - `GET /authorize`: approval screen, or redirect to login with a return-to marker
//! - `POST /approve`: approve or reject the pending authorization
//! - `ANY /auth/login`: upstream login page, or bounce back once signed in
//! - `ANY /.well-known/*`: always 404
//! - `ANY *`: return-to bounce or transparent proxy
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use portier_auth::HeaderAdapter;
//! use portier_server::{AppState, LocalProvider, Server, ServerConfig};
//!
//! let config = ServerConfig::new(logo_url, "Acme", "https://login.acme.dev".parse()?);
//! let state = AppState::new(Arc::new(adapter), Arc::new(LocalProvider::new()), config)?;
//! Server::new(state).run().await?;
//! ```

pub mod config;
pub mod cookies;
pub mod error;
pub mod forward;
pub mod pages;
pub mod provider;
pub mod return_to;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use forward::Forwarder;
pub use provider::{
    AuthRequest, AuthorizationMetadata, ClientRegistration, CompleteAuthorization,
    CompletedAuthorization, Grant, LocalProvider, OAuthProvider, ProviderError, SharedProvider,
};
pub use return_to::{RETURN_TO_COOKIE, ReturnTo};
pub use routes::ApproveForm;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    Router,
    middleware,
    routing::{any, get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The portier HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a server from application state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            // Other methods on the flow paths go to the upstream like any other path
            .route(
                "/authorize",
                get(routes::authorize_handler).fallback(routes::gateway_handler),
            )
            .route(
                "/approve",
                post(routes::approve_handler).fallback(routes::gateway_handler),
            )
            .route(return_to::LOGIN_PATH, any(routes::login_handler))
            .fallback(routes::gateway_handler)
            .layer(middleware::from_fn(cookies::adapter_cookies));

        if self.state.config.request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router.with_state(self.state.clone())
    }

    /// Run the server until the process exits.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves, then drain in-flight requests.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let listener = self.bind().await?;
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))
    }

    /// Start the server in the background, returning the bound address.
    ///
    /// Binding to port 0 picks a free port, which is what tests use.
    pub async fn run_with_shutdown(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<SocketAddr> {
        let listener = self.bind().await?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(format!("Failed to read local address: {}", e)))?;
        let router = self.router();

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(error = %e, "Server stopped with error");
            }
        });

        Ok(local_addr)
    }

    async fn bind(&self) -> Result<TcpListener> {
        let addr = self.state.config.bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {}: {}", addr, e)))?;
        let local_addr = listener.local_addr().unwrap_or(addr);
        info!(
            addr = %local_addr,
            target = %self.state.config.proxy_target_url,
            "Starting portier"
        );
        Ok(listener)
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}
