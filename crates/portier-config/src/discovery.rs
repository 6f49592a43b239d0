//! Config file discovery and environment overrides.
//!
//! Resolution order (first match wins):
//! 1. an explicit `--config` path (must exist)
//! 2. `./portier.toml` (project-local)
//! 3. `~/.config/portier/config.toml` (XDG user config)
//! 4. built-in defaults
//!
//! Environment overrides are applied on top of whichever source was used.

use std::path::{Path, PathBuf};

use crate::types::PortierConfig;
use crate::{ConfigError, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "portier.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "portier";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "PORTIER_CONFIG_DIR";

pub const ENV_BIND: &str = "PORTIER_BIND";
pub const ENV_LOGO_URL: &str = "PORTIER_LOGO_URL";
pub const ENV_COMPANY_NAME: &str = "PORTIER_COMPANY_NAME";
pub const ENV_PROXY_TARGET_URL: &str = "PORTIER_PROXY_TARGET_URL";
pub const ENV_AUTH_ADAPTER: &str = "PORTIER_AUTH_ADAPTER";
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The configuration, with environment overrides applied.
    pub config: PortierConfig,
    /// File the configuration came from, if any.
    pub source: Option<PathBuf>,
    /// Environment variables that overrode file values.
    pub overrides: Vec<&'static str>,
}

/// Load configuration using the process environment.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(explicit, None, xdg_config_path(), |name| {
        std::env::var(name).ok()
    })
}

/// Load configuration with explicit control over every input.
///
/// `project_dir` defaults to the working directory. `env` looks up
/// environment variables by name.
pub fn load_config_with_options(
    explicit: Option<&Path>,
    project_dir: Option<&Path>,
    user_config: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<LoadedConfig> {
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));

    let source = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => [Some(project_path), user_config]
            .into_iter()
            .flatten()
            .find(|p| p.is_file()),
    };

    let mut config = match &source {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading config file");
            load_config_file(path)?
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            PortierConfig::default()
        }
    };

    let overrides = apply_env_overrides(&mut config, env)?;

    Ok(LoadedConfig {
        config,
        source,
        overrides,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<PortierConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    PortierConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &PortierConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Apply environment overrides, returning the names that were set.
///
/// Empty values are ignored.
pub fn apply_env_overrides(
    config: &mut PortierConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Vec<&'static str>> {
    let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());
    let mut applied = Vec::new();

    let string_fields: [(&'static str, &mut Option<String>); 6] = [
        (ENV_BIND, &mut config.server.bind),
        (ENV_LOGO_URL, &mut config.branding.logo_url),
        (ENV_COMPANY_NAME, &mut config.branding.company_name),
        (ENV_PROXY_TARGET_URL, &mut config.proxy.target_url),
        (ENV_SUPABASE_URL, &mut config.auth.supabase_url),
        (ENV_SUPABASE_ANON_KEY, &mut config.auth.supabase_anon_key),
    ];
    for (name, field) in string_fields {
        if let Some(value) = lookup(name) {
            *field = Some(value);
            applied.push(name);
        }
    }

    if let Some(value) = lookup(ENV_AUTH_ADAPTER) {
        config.auth.adapter = value.parse()?;
        applied.push(ENV_AUTH_ADAPTER);
    }

    Ok(applied)
}

/// Get the XDG config file path for portier.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the XDG config directory for portier.
///
/// Checks `PORTIER_CONFIG_DIR` first, then falls back to the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
