//! Configuration file support for cmdvcs.
//!
//! Loads `cmdvcs.toml` from the working directory, falling back to the
//! user config directory (`~/.config/cmdvcs/cmdvcs.toml` on Linux).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cmdvcs_core::AdapterConfig;

/// Settings loaded from `cmdvcs.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Path to the external tool
    pub tool: Option<PathBuf>,
    /// Bound on each tool invocation, e.g. "30s"
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    /// How long root answers stay cached after last use, e.g. "1m"
    #[serde(default, with = "humantime_serde")]
    pub root_cache_ttl: Option<Duration>,
    /// Extra environment variables for the tool
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "cmdvcs.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        Self::load_from(&working_dir.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the user config directory
    pub fn load_user() -> Result<Option<Self>> {
        match dirs::config_dir() {
            Some(dir) => Self::load_from(&dir.join("cmdvcs").join(CONFIG_FILE_NAME)),
            None => Ok(None),
        }
    }

    fn load_from(config_path: &Path) -> Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Project file if present, else the user file, else defaults
    pub fn discover(working_dir: &Path) -> Result<Self> {
        if let Some(config) = Self::load(working_dir)? {
            return Ok(config);
        }
        Ok(Self::load_user()?.unwrap_or_default())
    }

    /// Build the adapter configuration.
    /// Priority: command-line flag > config file > built-in default
    pub fn adapter_config(&self, tool: Option<PathBuf>, timeout: Option<Duration>) -> AdapterConfig {
        let mut config = AdapterConfig::default();

        if let Some(tool) = tool.or_else(|| self.tool.clone()) {
            config.tool_path = tool;
        }
        if let Some(timeout) = timeout.or(self.timeout) {
            config.timeout = timeout;
        }
        if let Some(ttl) = self.root_cache_ttl {
            config.root_cache_ttl = ttl;
        }
        for (key, value) in &self.env {
            config = config.with_env(key.clone(), value.clone());
        }

        config
    }
}
