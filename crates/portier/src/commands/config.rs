//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use portier_config::{
    AdapterKind, AuthSection, BrandingSection, PortierConfig, ProxySection, ServerSection,
};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration (secrets masked)
    Show,

    /// Check that the resolved configuration is complete
    Validate,

    /// Show which config file is used
    Path,

    /// Write a starter config file
    Init {
        /// Create project-local config (./portier.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Validate => cmd_validate(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Init { local, force } => cmd_init(ctx, local, force),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    match &loaded.source {
        Some(path) => println!("# Loaded from {}", path.display()),
        None => println!("# No config file loaded (using defaults)"),
    }
    for var in &loaded.overrides {
        println!("# Overridden by ${}", var);
    }
    println!();
    print!("{}", loaded.config.redacted().to_toml()?);
    Ok(())
}

fn cmd_validate(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = loaded.config.validate()?;
    println!("Configuration OK");
    if ctx.verbose {
        println!("  bind:         {}", config.bind);
        println!("  proxy target: {}", config.proxy_target_url);
        println!("  adapter:      {}", loaded.config.auth.adapter);
        println!("  clients:      {}", config.clients.len());
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    match loaded.source {
        Some(path) => println!("{}", path.display()),
        None => {
            println!("(none)");
            if let Some(user) = portier_config::xdg_config_path() {
                println!("User config would be read from {}", user.display());
            }
        }
    }
    Ok(())
}

fn cmd_init(ctx: &Context, local: bool, force: bool) -> Result<()> {
    let path = match (&ctx.config_path, local) {
        (Some(path), _) => path.clone(),
        (None, true) => PathBuf::from("portier.toml"),
        (None, false) => match portier_config::xdg_config_path() {
            Some(path) => path,
            None => bail!("could not determine the user config directory; use --local"),
        },
    };

    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    portier_config::save_config(&starter_config(), &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn starter_config() -> PortierConfig {
    PortierConfig {
        server: ServerSection {
            bind: Some(portier_config::DEFAULT_BIND.to_string()),
            ..Default::default()
        },
        branding: BrandingSection {
            logo_url: Some("https://example.com/logo.png".to_string()),
            company_name: Some("Example Co".to_string()),
        },
        proxy: ProxySection {
            target_url: Some("http://localhost:3000".to_string()),
        },
        auth: AuthSection {
            adapter: AdapterKind::Header,
            ..Default::default()
        },
        ..Default::default()
    }
}
