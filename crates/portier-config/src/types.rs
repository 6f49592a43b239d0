//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]                 # bind address, body limit
//! [branding]               # logo and company name on the approval screens
//! [proxy]                  # upstream that serves login and everything else
//! [auth]                   # which adapter, plus its settings
//! [[provider.clients]]     # optional client allow-list
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, Result};

/// Default bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// Default max body size (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Every field is optional on disk so a partial file plus environment
/// overrides can still produce a complete config. [`PortierConfig::validate`]
/// decides whether the result is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortierConfig {
    pub server: ServerSection,
    pub branding: BrandingSection,
    pub proxy: ProxySection,
    pub auth: AuthSection,
    pub provider: ProviderSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address to bind to (`host:port`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Maximum inbound body size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_body_size: Option<usize>,

    /// Per-request tracing spans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_logging: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandingSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

/// Identity backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    /// Supabase SSR session cookies.
    #[default]
    Supabase,
    /// Trusted `x-user-*` headers. Only for trusted networks.
    Header,
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterKind::Supabase => write!(f, "supabase"),
            AdapterKind::Header => write!(f, "header"),
        }
    }
}

impl FromStr for AdapterKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(AdapterKind::Supabase),
            "header" => Ok(AdapterKind::Header),
            other => Err(ConfigError::invalid(
                "auth.adapter",
                format!("unknown adapter '{}' (expected 'supabase' or 'header')", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub adapter: AdapterKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supabase_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supabase_anon_key: Option<String>,

    /// `providerBaseUrl` prop for the header adapter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_base_url: Option<String>,
    /// `clientId` prop for the header adapter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clients: Vec<ClientEntry>,
}

/// An OAuth client allowed to use the local provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEntry {
    pub client_id: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Validated view
// ─────────────────────────────────────────────────────────────────────────────

/// Adapter settings after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterSettings {
    Supabase {
        url: Url,
        anon_key: String,
    },
    Header {
        provider_base_url: Option<String>,
        client_id: Option<String>,
    },
}

/// A complete, checked configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub bind: SocketAddr,
    pub max_body_size: usize,
    pub request_logging: bool,
    pub logo_url: String,
    pub company_name: String,
    pub proxy_target_url: Url,
    pub adapter: AdapterSettings,
    pub clients: Vec<ClientEntry>,
}

impl PortierConfig {
    /// Parse a config from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check that every required value is present and well formed.
    pub fn validate(&self) -> Result<ValidatedConfig> {
        let bind_raw = self.server.bind.as_deref().unwrap_or(DEFAULT_BIND);
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("server.bind", e))?;

        let logo_url = required(&self.branding.logo_url, "logo_url", "[branding]")?;
        let company_name = required(&self.branding.company_name, "company_name", "[branding]")?;
        let target = required(&self.proxy.target_url, "target_url", "[proxy]")?;
        let proxy_target_url = parse_http_url("proxy.target_url", &target)?;

        let adapter = match self.auth.adapter {
            AdapterKind::Supabase => {
                let url = required(&self.auth.supabase_url, "supabase_url", "[auth]")?;
                AdapterSettings::Supabase {
                    url: parse_http_url("auth.supabase_url", &url)?,
                    anon_key: required(&self.auth.supabase_anon_key, "supabase_anon_key", "[auth]")?,
                }
            }
            AdapterKind::Header => AdapterSettings::Header {
                provider_base_url: self.auth.provider_base_url.clone(),
                client_id: self.auth.client_id.clone(),
            },
        };

        for client in &self.provider.clients {
            if client.client_id.is_empty() {
                return Err(ConfigError::missing("client_id", "[[provider.clients]]"));
            }
            for uri in &client.redirect_uris {
                Url::parse(uri).map_err(|e| {
                    ConfigError::invalid(
                        "provider.clients.redirect_uris",
                        format!("'{}' for client '{}': {}", uri, client.client_id, e),
                    )
                })?;
            }
        }

        Ok(ValidatedConfig {
            bind,
            max_body_size: self.server.max_body_size.unwrap_or(DEFAULT_MAX_BODY_SIZE),
            request_logging: self.server.request_logging.unwrap_or(true),
            logo_url,
            company_name,
            proxy_target_url,
            adapter,
            clients: self.provider.clients.clone(),
        })
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.auth.supabase_anon_key.is_some() {
            copy.auth.supabase_anon_key = Some("********".to_string());
        }
        copy
    }
}

fn required(value: &Option<String>, field: &str, context: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::missing(field, context))
}

fn parse_http_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value).map_err(|e| ConfigError::invalid(field, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::invalid(
            field,
            format!("unsupported scheme '{}'", other),
        )),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
