//! Adapter configuration.
//!
//! Loaded from YAML; every field has a default so an empty file is valid:
//!
//! ```yaml
//! spec_dir: /var/lib/kubelet/hyper
//! proxy_image: haproxy
//! pull_proxy_image: true
//! dns: ["10.0.0.10"]
//! ```

use crate::constants::{DEFAULT_PROXY_IMAGE, MAX_CONFIG_SIZE};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory of the pod spec store.
    pub spec_dir: PathBuf,
    /// Companion proxy image pulled alongside pod images.
    pub proxy_image: String,
    /// Whether to pull the proxy image when it is absent.
    pub pull_proxy_image: bool,
    /// DNS servers handed to every container by the static run options.
    pub dns: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            spec_dir: crate::pod::runtime_base_path(),
            proxy_image: DEFAULT_PROXY_IMAGE.to_string(),
            pull_proxy_image: true,
            dns: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Parses configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.len() > MAX_CONFIG_SIZE {
            return Err(Error::InvalidInput(format!(
                "config size {} exceeds maximum {}",
                yaml.len(),
                MAX_CONFIG_SIZE
            )));
        }
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| Error::Serialization(format!("invalid config: {e}")))
    }

    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = RuntimeConfig::from_yaml("spec_dir: /tmp/specs\n").unwrap();
        assert_eq!(config.spec_dir, PathBuf::from("/tmp/specs"));
        assert_eq!(config.proxy_image, "haproxy");
        assert!(config.pull_proxy_image);
    }

    #[test]
    fn test_empty_config() {
        assert_eq!(RuntimeConfig::from_yaml("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(RuntimeConfig::from_yaml("pull_proxy_image: [1]").is_err());
    }
}
