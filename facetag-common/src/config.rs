//! Bootstrap configuration loading and root folder resolution
//!
//! The TOML file is optional. A missing file yields defaults plus a warning;
//! a file that exists but does not parse is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "FACETAG_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "facetag.db";

/// Bootstrap configuration read from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the local database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Remote store access token
    #[serde(default)]
    pub dropbox_access_token: Option<String>,

    /// Face recognition subscription key
    #[serde(default)]
    pub face_api_key: Option<String>,

    /// Full face API base URL, e.g. `https://westus.api.cognitive.microsoft.com/face/v1.0`
    #[serde(default)]
    pub face_api_endpoint: Option<String>,

    /// Region used to build the face API URL when no endpoint is given
    #[serde(default)]
    pub face_api_location: Option<String>,

    /// Person group holding enrolled identities
    #[serde(default)]
    pub person_group_id: Option<String>,

    /// Human readable person group name
    #[serde(default)]
    pub person_group_name: Option<String>,

    /// Remote folder scanned for photos
    #[serde(default)]
    pub photos_folder: Option<String>,

    /// Page size hint for folder listings
    #[serde(default)]
    pub list_limit: Option<u32>,

    /// Checkpoint namespace
    #[serde(default)]
    pub tag_space: Option<String>,

    /// Minimum interval between face API calls
    #[serde(default)]
    pub throttle_interval_ms: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
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

/// Default configuration file location (`<config_dir>/facetag/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("facetag").join("config.toml"))
}

/// Load the TOML configuration
///
/// A missing file is not fatal: defaults are returned and a warning logged.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using defaults"
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Root folder resolution in priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("facetag"))
        .unwrap_or_else(|| PathBuf::from("./facetag_data"))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}
