use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use cmdvcs_process::DEFAULT_TIMEOUT;

use crate::root_cache::{RootCache, DEFAULT_ROOT_CACHE_TTL};

/// Where the external tool is installed unless configured otherwise
pub const DEFAULT_TOOL_PATH: &str = "/usr/local/bin/cmdline-vcs";

/// Subcommands understood by the external tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subcommand {
    ListChangedFiles,
    GetBaseFileContents,
    GetVcsRoot,
}

impl Subcommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subcommand::ListChangedFiles => "list-changed-files",
            Subcommand::GetBaseFileContents => "get-base-file-contents",
            Subcommand::GetVcsRoot => "get-vcs-root",
        }
    }
}

impl fmt::Display for Subcommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for talking to the external tool
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Path to the tool executable
    pub tool_path: PathBuf,
    /// Bound on every tool invocation
    pub timeout: Duration,
    /// How long root answers stay cached after last use
    pub root_cache_ttl: Duration,
    /// Additional environment variables for the tool
    pub env_vars: HashMap<String, String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            tool_path: PathBuf::from(DEFAULT_TOOL_PATH),
            timeout: DEFAULT_TIMEOUT,
            root_cache_ttl: DEFAULT_ROOT_CACHE_TTL,
            env_vars: HashMap::new(),
        }
    }
}

impl AdapterConfig {
    pub fn new(tool_path: PathBuf) -> Self {
        Self {
            tool_path,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.root_cache_ttl = ttl;
        self
    }

    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.env_vars.insert(key, value);
        self
    }

    /// Fresh root cache using the configured TTL, ready to share via `Arc`
    pub fn new_root_cache(&self) -> RootCache {
        RootCache::with_ttl(self.root_cache_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AdapterConfig::default();
        assert_eq!(config.tool_path, PathBuf::from("/usr/local/bin/cmdline-vcs"));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.root_cache_ttl, Duration::from_secs(60));
        assert!(config.env_vars.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = AdapterConfig::new(PathBuf::from("/opt/tool"))
            .with_timeout(Duration::from_secs(5))
            .with_env("LANG".to_string(), "C".to_string());
        assert_eq!(config.tool_path, PathBuf::from("/opt/tool"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.env_vars.get("LANG").map(String::as_str), Some("C"));
    }

    #[test]
    fn test_cache_ttl_reaches_root_cache() {
        let config = AdapterConfig::default().with_cache_ttl(Duration::from_secs(5));
        assert_eq!(config.new_root_cache().ttl(), Duration::from_secs(5));
        assert_eq!(
            AdapterConfig::default().new_root_cache().ttl(),
            DEFAULT_ROOT_CACHE_TTL
        );
    }

    #[test]
    fn test_subcommand_names() {
        assert_eq!(Subcommand::ListChangedFiles.to_string(), "list-changed-files");
        assert_eq!(Subcommand::GetBaseFileContents.as_str(), "get-base-file-contents");
        assert_eq!(Subcommand::GetVcsRoot.as_str(), "get-vcs-root");
    }
}
