//! Configuration resolution for facetag
//!
//! Credentials resolve with CLI/ENV → TOML priority (clap merges the CLI
//! flag and its environment variable into one value). Everything else falls
//! back to built-in defaults.

use crate::recognition::AzureFaceClient;
use crate::services::rate_limiter::FACE_API_INTERVAL;
use facetag_common::config::TomlConfig;
use facetag_common::{Error, Result};
use std::time::Duration;
use tracing::{info, warn};

pub const DROPBOX_TOKEN_ENV: &str = "FACETAG_DROPBOX_TOKEN";
pub const FACE_API_KEY_ENV: &str = "FACETAG_FACE_API_KEY";

pub const DEFAULT_PHOTOS_FOLDER: &str = "/photos";
pub const DEFAULT_PERSON_GROUP_ID: &str = "facetag-people";
pub const DEFAULT_PERSON_GROUP_NAME: &str = "facetag people";
pub const DEFAULT_FACE_API_LOCATION: &str = "westus";
pub const DEFAULT_TAG_SPACE: &str = "default";

/// Effective service settings after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub dropbox_access_token: String,
    pub face_api_key: String,
    pub face_api_endpoint: String,
    pub person_group_id: String,
    pub person_group_name: String,
    pub photos_folder: String,
    pub list_limit: Option<u32>,
    pub tag_space: String,
    pub throttle_interval: Duration,
}

impl ServiceSettings {
    /// Resolve from command-line/environment values and the TOML file
    pub fn resolve(
        cli_dropbox_token: Option<&str>,
        cli_face_api_key: Option<&str>,
        toml_config: &TomlConfig,
    ) -> Result<Self> {
        let dropbox_access_token = resolve_credential(
            "Dropbox access token",
            cli_dropbox_token,
            toml_config.dropbox_access_token.as_deref(),
            DROPBOX_TOKEN_ENV,
            "dropbox_access_token",
        )?;
        let face_api_key = resolve_credential(
            "Face API key",
            cli_face_api_key,
            toml_config.face_api_key.as_deref(),
            FACE_API_KEY_ENV,
            "face_api_key",
        )?;

        let face_api_endpoint = match &toml_config.face_api_endpoint {
            Some(endpoint) if is_valid_key(endpoint) => endpoint.trim_end_matches('/').to_string(),
            _ => AzureFaceClient::endpoint_for_location(
                toml_config
                    .face_api_location
                    .as_deref()
                    .unwrap_or(DEFAULT_FACE_API_LOCATION),
            ),
        };

        let throttle_interval = toml_config
            .throttle_interval_ms
            .map(facetag_common::time::millis_to_duration)
            .unwrap_or(FACE_API_INTERVAL);
        if throttle_interval < FACE_API_INTERVAL {
            warn!(
                interval_ms = throttle_interval.as_millis() as u64,
                "Throttle interval below the face API free-tier quota"
            );
        }

        Ok(Self {
            dropbox_access_token,
            face_api_key,
            face_api_endpoint,
            person_group_id: toml_config
                .person_group_id
                .clone()
                .unwrap_or_else(|| DEFAULT_PERSON_GROUP_ID.to_string()),
            person_group_name: toml_config
                .person_group_name
                .clone()
                .unwrap_or_else(|| DEFAULT_PERSON_GROUP_NAME.to_string()),
            photos_folder: toml_config
                .photos_folder
                .clone()
                .unwrap_or_else(|| DEFAULT_PHOTOS_FOLDER.to_string()),
            list_limit: toml_config.list_limit,
            tag_space: toml_config
                .tag_space
                .clone()
                .unwrap_or_else(|| DEFAULT_TAG_SPACE.to_string()),
            throttle_interval,
        })
    }
}

/// Pick a credential: CLI/ENV first, then TOML
///
/// Warns when both sources carry a value.
pub fn resolve_credential(
    label: &str,
    cli_or_env: Option<&str>,
    toml_value: Option<&str>,
    env_var: &str,
    toml_key: &str,
) -> Result<String> {
    let cli_or_env = cli_or_env.filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    if cli_or_env.is_some() && toml_value.is_some() {
        warn!(
            "{} found in multiple sources: command line/environment, TOML. Using command line/environment.",
            label
        );
    }

    if let Some(value) = cli_or_env {
        info!("{} loaded from command line/environment", label);
        return Ok(value.to_string());
    }

    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", label);
        return Ok(value.to_string());
    }

    Err(Error::Config(format!(
        "{} not configured. Please configure using one of:\n\
         1. Environment: {}=your-value\n\
         2. TOML config: {} = \"your-value\"",
        label, env_var, toml_key
    )))
}

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
