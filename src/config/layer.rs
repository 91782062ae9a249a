//! Configuration layers.
//!
//! A [`ConfigLayer`] holds the settings one source provides. Missing fields
//! stay `None` so that merging only overrides what a source actually set.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, Result};

/// Store base URL.
pub const ENV_URL: &str = "REGISTRY_URL";
/// Basic-auth username.
pub const ENV_USERNAME: &str = "REGISTRY_USERNAME";
/// Basic-auth password.
pub const ENV_PASSWORD: &str = "REGISTRY_PASSWORD";
/// Staging directory for archives.
pub const ENV_STAGING_DIR: &str = "REGISTRY_STAGING_DIR";
/// Per-request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "REGISTRY_TIMEOUT_SECS";

/// Settings provided by one configuration source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
    pub staging_dir: Option<PathBuf>,
    pub list_concurrency: Option<usize>,
}

impl ConfigLayer {
    /// Parse a layer from YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| RegistryError::Config {
            message: format!("invalid config: {}", e),
        })
    }

    /// Load a layer from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| RegistryError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;

        Self::parse(&content).map_err(|e| RegistryError::Config {
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Build a layer from environment variables.
    ///
    /// Empty values are treated as unset.
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let get = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

        Self {
            url: get(ENV_URL),
            username: get(ENV_USERNAME),
            password: get(ENV_PASSWORD),
            timeout_secs: get(ENV_TIMEOUT_SECS).and_then(|v| v.parse().ok()),
            staging_dir: get(ENV_STAGING_DIR).map(PathBuf::from),
            list_concurrency: None,
        }
    }

    /// Build a layer from the real process environment.
    pub fn from_process_env() -> Self {
        Self::from_env(&std::env::vars().collect())
    }

    /// Overlay `other` on top of this layer.
    pub fn merge(self, other: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            url: other.url.or(self.url),
            username: other.username.or(self.username),
            password: other.password.or(self.password),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            staging_dir: other.staging_dir.or(self.staging_dir),
            list_concurrency: other.list_concurrency.or(self.list_concurrency),
        }
    }
}
