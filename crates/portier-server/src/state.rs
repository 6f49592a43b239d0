//! Application state shared across handlers.

use std::sync::Arc;

use portier_auth::SharedAuthAdapter;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::forward::Forwarder;
use crate::provider::SharedProvider;

/// Process-scoped state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    /// Identity backend.
    pub adapter: SharedAuthAdapter,

    /// OAuth provider engine.
    pub provider: SharedProvider,

    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Upstream forwarder for the login page and everything else.
    pub forwarder: Arc<Forwarder>,
}

impl AppState {
    /// Create application state, building a forwarder for the configured
    /// proxy target.
    pub fn new(
        adapter: SharedAuthAdapter,
        provider: SharedProvider,
        config: ServerConfig,
    ) -> Result<Self> {
        let forwarder = Forwarder::new(config.proxy_target_url.clone(), config.max_body_size)?;
        Ok(Self::with_forwarder(adapter, provider, config, forwarder))
    }

    /// Create application state with a pre-built forwarder.
    pub fn with_forwarder(
        adapter: SharedAuthAdapter,
        provider: SharedProvider,
        config: ServerConfig,
        forwarder: Forwarder,
    ) -> Self {
        Self {
            adapter,
            provider,
            config: Arc::new(config),
            forwarder: Arc::new(forwarder),
        }
    }
}
