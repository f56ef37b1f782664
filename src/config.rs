use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

fn default_timeout_secs() -> u64 {
    10
}

/// Client configuration: which control server to talk to and how long to
/// wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Config {
    pub fn new(server_url: String) -> Self {
        Self {
            server_url,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("tundeck");
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        bail!("tundeck is not configured. Run `tundeck init` first.");
    }
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    toml::from_str(&contents).context("Invalid config format")
}

/// Effective config for a command: the saved file, with the server URL
/// optionally overridden. An override also works without a saved config.
pub fn resolve_config(server_override: Option<&str>) -> Result<Config> {
    match server_override {
        Some(url) => Ok(match load_config() {
            Ok(mut config) => {
                config.server_url = url.to_string();
                config
            }
            Err(_) => Config::new(url.to_string()),
        }),
        None => load_config(),
    }
}

pub fn save_config(config: &Config) -> Result<()> {
    let dir = config_dir()?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

    let path = config_path()?;
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(&path, contents)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}
