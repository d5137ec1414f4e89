pub mod schema;

pub use schema::{DeepspecConfig, DEFAULT_MODEL_NAME};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file name inside the home directory.
pub const CONFIG_FILE: &str = "deepspec.toml";

/// Default deepspec home directory (~/.deepspec).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".deepspec"))
        .unwrap_or_else(|| PathBuf::from(".deepspec"))
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<DeepspecConfig> {
    if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read deepspec config file")?;
        let config: DeepspecConfig =
            toml::from_str(&contents).context("Failed to parse deepspec config (TOML)")?;
        Ok(config)
    } else {
        debug!("No config at {}, using defaults", path.display());
        Ok(DeepspecConfig::default())
    }
}

/// Load the config file, then apply environment overrides.
pub fn load(path: &Path) -> Result<DeepspecConfig> {
    let mut config = load_config(path)?;
    apply_env(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Override fields from environment variables. Empty values are ignored.
pub fn apply_env(config: &mut DeepspecConfig, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = var("GOOGLE_CLOUD_PROJECT") {
        config.gcp_project_id = v;
    }
    if let Some(v) = var("GCP_LOCATION") {
        config.gcp_location = v;
    }
    if let Some(v) = var("GCP_MODEL_NAME") {
        config.model_name = v;
    }
    if let Some(v) = var("GCP_ACCESS_TOKEN") {
        config.access_token = v;
    }
    if let Some(v) = var("DEEPSPEC_MCP_URL") {
        config.mcp_server_url = v;
    }
    if config.model_name.is_empty() {
        config.model_name = DEFAULT_MODEL_NAME.into();
    }
}
