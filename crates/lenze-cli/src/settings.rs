//! Client settings resolution
//!
//! `--base-url` (or `LENZE_BASE_URL`) wins over the config file, which wins
//! over built-in defaults.

use anyhow::{Context, Result};
use lenze_core::ClientConfig;
use std::path::Path;

pub fn resolve(config_path: Option<&Path>, base_url: Option<&str>) -> Result<ClientConfig> {
    let mut config = ClientConfig::load_or_default(config_path)
        .context("Failed to load client configuration")?;

    if let Some(base_url) = base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }

    config
        .endpoints()
        .with_context(|| format!("Invalid endpoint configuration for {}", config.base_url))?;

    Ok(config)
}
