//! Bootstrap configuration and root folder resolution
//!
//! Resolution order for every value:
//! 1. Command-line argument or environment variable (handled by the binary)
//! 2. TOML config file
//! 3. Compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "vap.db";

/// TOML bootstrap configuration
///
/// Every field is optional in the file; missing values fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub recognizer: RecognizerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: default_bind_address(),
            port: default_port(),
            recognizer: RecognizerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// External face recognizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizerConfig {
    #[serde(default = "default_recognizer_url")]
    pub url: String,

    /// Upper bound on a single recognizer round trip
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            url: default_recognizer_url(),
            timeout_ms: default_timeout_ms(),
            default_threshold: default_threshold(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_recognizer_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_threshold() -> f64 {
    crate::models::DEFAULT_THRESHOLD
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.recognizer.default_threshold) {
            return Err(Error::Config(format!(
                "recognizer.default_threshold must be within [0, 1], got {}",
                self.recognizer.default_threshold
            )));
        }
        if self.recognizer.timeout_ms == 0 {
            return Err(Error::Config("recognizer.timeout_ms must be positive".to_string()));
        }
        if self.recognizer.url.trim().is_empty() {
            return Err(Error::Config("recognizer.url must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Parse TOML text into a validated config
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    let config: TomlConfig =
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Load the TOML config at `path`
///
/// A missing file is not an error: the service starts on defaults.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = parse_toml_config(&content)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Platform config file location for a module, e.g. `~/.config/vap/vap-mark.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vap").join(format!("{}.toml", module_name)))
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vap"))
        .unwrap_or_else(|| PathBuf::from("./vap_data"))
}

/// Pick the root folder: explicit override, then TOML, then the platform default
pub fn resolve_root_folder(override_path: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = override_path {
        return path.to_path_buf();
    }
    if let Some(path) = &config.root_folder {
        return path.clone();
    }
    default_root_folder()
}

/// Create the root folder if missing and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    Ok(root_folder.join(DATABASE_FILE))
}
