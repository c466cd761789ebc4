//! Configuration loading and layering.
//!
//! Precedence, highest first: command-line flag, environment variable,
//! config file, built-in default. Empty values count as unset at every layer.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::HostrouteConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_ADMIN: &str = "HOSTROUTE_ADMIN";
pub const ENV_SERVER: &str = "HOSTROUTE_SERVER";
pub const ENV_STATE_DIR: &str = "HOSTROUTE_STATE_DIR";
pub const ENV_CONFIG: &str = "HOSTROUTE_CONFIG";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "IO error reading {}: {}", path.display(), e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Values supplied explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub admin_url: Option<String>,
    pub server: Option<String>,
    pub state_dir: Option<PathBuf>,
}

/// Read a variable from the process environment, treating empty as unset.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<HostrouteConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    let config: HostrouteConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build the effective configuration from all layers.
///
/// `env` is consulted for every environment-backed setting; pass
/// [`process_env`] in production.
pub fn resolve_config<F>(overrides: &Overrides, env: F) -> Result<HostrouteConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = |key: &str| env(key).filter(|v| !v.is_empty());

    let file = non_empty_path(overrides.config_path.clone())
        .or_else(|| env(ENV_CONFIG).map(PathBuf::from));
    let mut config = match file {
        Some(path) => load_config(&path)?,
        None => HostrouteConfig::default(),
    };

    if let Some(url) = non_empty(overrides.admin_url.clone()).or_else(|| env(ENV_ADMIN)) {
        config.admin.url = url;
    }
    if let Some(server) = non_empty(overrides.server.clone()).or_else(|| env(ENV_SERVER)) {
        config.admin.server = Some(server);
    }
    if let Some(dir) = non_empty_path(overrides.state_dir.clone())
        .or_else(|| env(ENV_STATE_DIR).map(PathBuf::from))
    {
        config.state.dir = Some(dir);
    }
    config.admin.server = non_empty(config.admin.server.take());
    config.state.dir = non_empty_path(config.state.dir.take());

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|p| !p.as_os_str().is_empty())
}
