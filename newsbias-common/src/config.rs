//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument / environment variable (handled by the binary via clap)
//! 2. TOML config file (explicit path, else the platform config directory)
//! 3. Compiled defaults (fallback)
//!
//! A missing config file is not an error: the service starts on defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "NEWSBIAS_CONFIG";

/// Compiled default values used when no override is present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDefaults {
    pub bind_address: String,
    pub port: u16,
    pub deployer: String,
    pub event_capacity: usize,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn get() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5790,
            deployer: "deployer".to_string(),
            event_capacity: 1000,
            log_level: "info".to_string(),
        }
    }
}

/// Contents of `config.toml`
///
/// Every field is optional; absent fields fall through to [`CompiledDefaults`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TomlConfig {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    /// Principal seeded into the authorization registry at startup
    pub deployer: Option<String>,
    /// Capacity of the event broadcast channel
    pub event_capacity: Option<usize>,
    pub log_level: Option<String>,
}

/// Fully resolved service settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub port: u16,
    pub deployer: String,
    pub event_capacity: usize,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge a TOML config over the compiled defaults
    pub fn from_toml(toml: TomlConfig) -> Self {
        let defaults = CompiledDefaults::get();
        Self {
            bind_address: toml.bind_address.unwrap_or(defaults.bind_address),
            port: toml.port.unwrap_or(defaults.port),
            deployer: toml.deployer.unwrap_or(defaults.deployer),
            event_capacity: toml.event_capacity.unwrap_or(defaults.event_capacity),
            log_level: toml.log_level.unwrap_or(defaults.log_level),
        }
    }

    /// Reject settings the service cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.deployer.trim().is_empty() {
            return Err(Error::Config("deployer must not be empty".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default())
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Default config file location for the platform (`<config dir>/newsbias/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("newsbias").join("config.toml"))
}

/// Resolve service settings
///
/// An explicit path (CLI or `NEWSBIAS_CONFIG`) that cannot be read or parsed is an
/// error. The platform default path is optional: if it is missing, defaults apply.
pub fn resolve_service_config(explicit_path: Option<&Path>) -> Result<ServiceConfig> {
    let env_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);

    let toml = match explicit_path.map(Path::to_path_buf).or(env_path) {
        Some(path) => {
            info!("Loading config from {}", path.display());
            load_toml_config(&path)?
        }
        None => match default_config_path() {
            Some(path) if path.exists() => match load_toml_config(&path) {
                Ok(toml) => {
                    info!("Loaded config from {}", path.display());
                    toml
                }
                Err(e) => {
                    warn!("Ignoring unreadable config {}: {}", path.display(), e);
                    TomlConfig::default()
                }
            },
            _ => {
                debug!("No config file found, using compiled defaults");
                TomlConfig::default()
            }
        },
    };

    let config = ServiceConfig::from_toml(toml);
    config.validate()?;
    Ok(config)
}
