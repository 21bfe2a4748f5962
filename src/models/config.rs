use crate::models::config_validator::validate_config;
use crate::models::error::{BackupError, Result};
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Bild PDM API, e.g. "https://api.getbild.com".
    pub api_base_url: String,
    /// File holding the Bearer token, nothing else.
    pub api_token_file: String,
    /// Root directory the backup tree is written under.
    pub destination: String,
    #[serde(default = "default_database_file")]
    pub database_file: String,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default = "bool_true")]
    pub run_on_startup: bool,
    #[serde(default = "bool_false")]
    pub force_overwrite: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

fn default_database_file() -> String {
    ":memory:".to_string()
}
const fn bool_false() -> bool {
    false
}
const fn bool_true() -> bool {
    true
}
const fn default_request_timeout() -> u64 {
    30
}
const fn default_download_timeout() -> u64 {
    300
}

impl Config {
    /// Reads the Bearer token from `api_token_file`, trimmed of whitespace.
    pub fn load_api_token(&self) -> Result<String> {
        let path = PathBuf::from(&self.api_token_file);
        let token = fs::read_to_string(&path).map_err(|cause| BackupError::TokenRead {
            path: path.clone(),
            cause,
        })?;
        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(BackupError::ConfigInvalid(format!(
                "API token file '{}' is empty",
                path.display()
            )));
        }
        Ok(token)
    }
}

pub fn setup_config(config_file: String) -> Result<Config> {
    let config_path = PathBuf::from(config_file);
    info!("Loading config from: {}", config_path.display());

    let config_str = fs::read_to_string(&config_path).map_err(|cause| BackupError::ConfigRead {
        path: config_path.clone(),
        cause,
    })?;

    let config: Config = serde_json::from_str(&config_str).map_err(|cause| {
        BackupError::ConfigParse {
            path: config_path,
            cause,
        }
    })?;

    validate_config(&config)?;

    Ok(config)
}
