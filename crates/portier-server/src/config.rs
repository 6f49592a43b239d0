//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};

use url::Url;

/// Default port the gateway listens on.
pub const DEFAULT_PORT: u16 = 8787;

/// Default max body size for forwarded and form requests (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Runtime configuration for the approval front end.
///
/// Branding and the proxy target are required; the embedding application
/// decides where they come from.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Logo shown on the approval screens.
    pub logo_url: String,

    /// Company/application name shown on the approval screens.
    pub company_name: String,

    /// Upstream that serves the login page and everything else.
    pub proxy_target_url: Url,

    /// Maximum request body size in bytes, for forwarded requests and the
    /// approval form.
    pub max_body_size: usize,

    /// Enable per-request tracing spans.
    pub request_logging: bool,
}

impl ServerConfig {
    /// Create a config with the required branding and proxy target.
    pub fn new(
        logo_url: impl Into<String>,
        company_name: impl Into<String>,
        proxy_target_url: Url,
    ) -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            logo_url: logo_url.into(),
            company_name: company_name.into(),
            proxy_target_url,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            request_logging: true,
        }
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the maximum request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }
}
