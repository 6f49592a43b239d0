//! Configuration for portier.
//!
//! Provides TOML-based configuration with:
//! - Server, branding, proxy, auth and provider sections
//! - Discovery of `--config`, `./portier.toml` and the XDG user config
//! - Environment overrides (`PORTIER_*`, `SUPABASE_*`)
//! - Validation into a complete [`ValidatedConfig`]

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, apply_env_overrides, load_config, load_config_file, load_config_with_options,
    save_config, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
