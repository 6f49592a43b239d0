//! Serve command - runs the approval front end.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::{info, warn};

use portier_auth::{
    HeaderAdapter, HeaderAdapterConfig, SharedAuthAdapter, SupabaseAdapter, SupabaseConfig,
};
use portier_config::{AdapterSettings, ClientEntry, ValidatedConfig};
use portier_server::{AppState, ClientRegistration, LocalProvider, Server, ServerConfig};

use super::Context;

/// Arguments for the serve command.
///
/// CLI arguments override config file and environment values.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Upstream URL for login and proxied paths (overrides config)
    #[arg(long)]
    pub proxy_target: Option<String>,

    /// Disable per-request tracing spans
    #[arg(long)]
    pub no_request_log: bool,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let mut loaded = ctx.load_config()?;
    match &loaded.source {
        Some(path) => info!(path = %path.display(), "Loaded config"),
        None => info!("No config file found, using defaults and environment"),
    }
    if !loaded.overrides.is_empty() {
        info!(vars = ?loaded.overrides, "Applied environment overrides");
    }

    if let Some(bind) = args.bind {
        loaded.config.server.bind = Some(bind);
    }
    if let Some(target) = args.proxy_target {
        loaded.config.proxy.target_url = Some(target);
    }

    let config = loaded.config.validate().context("invalid configuration")?;
    let state = build_state(config, args.no_request_log)?;

    Server::new(state).run_until(shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

/// Wire adapter, provider and server config from a validated config.
fn build_state(config: ValidatedConfig, no_request_log: bool) -> Result<AppState> {
    let adapter = build_adapter(&config.adapter)?;
    let provider = Arc::new(build_provider(&config.clients));

    let server_config = ServerConfig::new(
        config.logo_url,
        config.company_name,
        config.proxy_target_url,
    )
    .with_bind_address(config.bind)
    .with_max_body_size(config.max_body_size)
    .with_request_logging(config.request_logging && !no_request_log);

    Ok(AppState::new(adapter, provider, server_config)?)
}

fn build_adapter(settings: &AdapterSettings) -> Result<SharedAuthAdapter> {
    match settings {
        AdapterSettings::Supabase { url, anon_key } => {
            let adapter = SupabaseAdapter::new(SupabaseConfig {
                url: url.to_string(),
                anon_key: anon_key.clone(),
            })
            .context("failed to create Supabase adapter")?;
            info!(cookie = %adapter.cookie_name(), "Using Supabase adapter");
            Ok(Arc::new(adapter))
        }
        AdapterSettings::Header {
            provider_base_url,
            client_id,
        } => {
            warn!("Using header-trust adapter; only run this behind a trusted proxy");
            Ok(Arc::new(HeaderAdapter::new(HeaderAdapterConfig {
                provider_base_url: provider_base_url.clone(),
                client_id: client_id.clone(),
            })))
        }
    }
}

fn build_provider(clients: &[ClientEntry]) -> LocalProvider {
    if clients.is_empty() {
        warn!("No [[provider.clients]] configured; accepting any client");
        return LocalProvider::new();
    }
    info!(count = clients.len(), "Restricting provider to registered clients");
    LocalProvider::with_clients(clients.iter().map(|c| ClientRegistration {
        client_id: c.client_id.clone(),
        redirect_uris: c.redirect_uris.clone(),
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
