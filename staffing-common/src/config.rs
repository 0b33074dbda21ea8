//! Configuration loading and root folder resolution
//!
//! Every staffing tool resolves its settings in the same order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is never an error; the tool falls back to defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "STAFFING_CONFIG";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "STAFFING_ROOT_FOLDER";

/// Bootstrap settings shared by every staffing tool
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database and default workbook location
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Path to SQLite database file (defaults to `<root_folder>/staffing.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
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

fn default_log_level() -> String {
    "info".to_string()
}

/// Locate the config file: explicit path first, then `STAFFING_CONFIG`,
/// then `<config_dir>/staffing/config.toml`.
///
/// Returns `None` when no location can be determined.
pub fn config_file_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("staffing").join("config.toml"))
}

/// Read and deserialize a TOML file
///
/// Returns `Ok(None)` when the file does not exist. Read or parse failures
/// are configuration errors.
pub fn read_toml_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        debug!("Config file not found, using defaults: {}", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let parsed = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(Some(parsed))
}

/// Root folder resolution: CLI argument, then environment variable, then
/// TOML value, then the OS default.
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_value: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/staffing (or /var/lib/staffing for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("staffing"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/staffing"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("staffing"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/staffing"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("staffing"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\staffing"))
    } else {
        PathBuf::from("./staffing_data")
    }
}
