//! Resolved store configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::layer::ConfigLayer;
use crate::error::{RegistryError, Result};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of repositories enumerated in parallel.
pub const DEFAULT_LIST_CONCURRENCY: usize = 4;

/// Everything needed to open a session with the artifact store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Store location as configured (`host[:port]` or a full URL).
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    pub staging_dir: PathBuf,
    pub list_concurrency: usize,
}

impl StoreConfig {
    /// Create a config for the given store with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
            staging_dir: std::env::temp_dir(),
            list_concurrency: DEFAULT_LIST_CONCURRENCY,
        }
    }

    /// Set basic-auth credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the staging directory.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Merge layers in order and resolve them into a config.
    ///
    /// Fails with [`RegistryError::Config`] when no layer sets a URL.
    pub fn from_layers(layers: impl IntoIterator<Item = ConfigLayer>) -> Result<Self> {
        let merged = layers
            .into_iter()
            .fold(ConfigLayer::default(), ConfigLayer::merge);

        let url = merged
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| RegistryError::Config {
                message: format!("no store URL configured (set {})", super::ENV_URL),
            })?;

        let mut config = Self::new(url.trim());
        config.username = merged.username;
        config.password = merged.password;
        if let Some(secs) = merged.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = merged.staging_dir {
            config.staging_dir = dir;
        }
        if let Some(n) = merged.list_concurrency {
            config.list_concurrency = n.max(1);
        }

        Ok(config)
    }

    /// The store base URL with scheme and without a trailing slash.
    ///
    /// Bare hosts get `https://`, except loopback hosts which get `http://`.
    pub fn base_url(&self) -> String {
        let url = self.url.trim_end_matches('/');
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }

        let host = url.split(':').next().unwrap_or(url);
        let scheme = if matches!(host, "localhost" | "127.0.0.1") || url.starts_with("[::1]") {
            "http"
        } else {
            "https"
        };
        format!("{}://{}", scheme, url)
    }

    /// Whether credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("staging_dir", &self.staging_dir)
            .field("list_concurrency", &self.list_concurrency)
            .finish()
    }
}
