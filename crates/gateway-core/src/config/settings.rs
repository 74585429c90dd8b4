//! Loads [`Settings`] from a JSON configuration file.
//!
//! Grounded in the teacher's `config::settings::load_settings`: same
//! path-traversal guard, same file-size cap, same JSON-over-YAML choice
//! (the distilled spec's YAML non-goal excludes YAML specifically, not
//! configuration loading — see SPEC_FULL.md §6). The env var is renamed
//! from `KAIROS_CONFIG_PATH` to `GATEWAY_CONFIG_PATH`.

use std::fs;
use std::path::Path;

use log::debug;

use crate::models::settings::Settings;

const MAX_CONFIG_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const CONFIG_PATH_ENV_VAR: &str = "GATEWAY_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "./config.json";

/// Loads and parses the gateway configuration from the file system.
///
/// Resolution order: `GATEWAY_CONFIG_PATH` env var, else `./config.json`.
/// The resolved path must canonicalize to somewhere inside the current
/// working directory and must not exceed the size cap.
pub fn load_settings() -> Result<Settings, Box<dyn std::error::Error>> {
    let config_path =
        std::env::var(CONFIG_PATH_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    debug!("loading configuration from {config_path}");
    load_settings_from(&config_path)
}

/// Loads configuration from an explicit path, bypassing the env var. Used
/// directly by tests and by callers that already resolved a path.
pub fn load_settings_from(config_path: &str) -> Result<Settings, Box<dyn std::error::Error>> {
    let path = Path::new(config_path);

    if !path.exists() {
        return Err(format!("cannot resolve config path '{config_path}'").into());
    }

    let canonical_path = path
        .canonicalize()
        .map_err(|e| format!("cannot resolve config path '{config_path}': {e}"))?;

    let current_dir =
        std::env::current_dir().map_err(|e| format!("cannot get current directory: {e}"))?;

    if !canonical_path.starts_with(&current_dir) {
        return Err("config path outside working directory".into());
    }

    let metadata = fs::metadata(&canonical_path)
        .map_err(|e| format!("cannot read config file metadata: {e}"))?;
    if metadata.len() > MAX_CONFIG_SIZE_BYTES {
        return Err(format!(
            "config file too large: {} bytes (max: {} bytes)",
            metadata.len(),
            MAX_CONFIG_SIZE_BYTES
        )
        .into());
    }

    let config_data =
        fs::read_to_string(&canonical_path).map_err(|e| format!("cannot read config file: {e}"))?;

    let settings: Settings =
        serde_json::from_str(&config_data).map_err(|e| format!("invalid JSON: {e}"))?;

    debug!("loaded configuration with {} services", settings.services.len());
    Ok(settings)
}
