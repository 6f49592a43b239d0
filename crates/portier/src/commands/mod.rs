//! CLI command handlers.

use std::path::PathBuf;

pub mod config;
pub mod serve;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file, if given.
    pub config_path: Option<PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Discover and load configuration, honoring `--config`.
    pub fn load_config(&self) -> anyhow::Result<portier_config::LoadedConfig> {
        Ok(portier_config::load_config(self.config_path.as_deref())?)
    }
}
