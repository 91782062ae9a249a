//! Store configuration.
//!
//! Configuration is an explicit value handed to the session constructor,
//! never ambient global state. It is assembled from layers:
//!
//! 1. Built-in defaults
//! 2. Config file (YAML)
//! 3. Process environment (`REGISTRY_*`)
//! 4. Command-line flags
//!
//! Later layers override earlier ones field by field.
//!
//! # Example
//!
//! ```
//! use modreg::config::{ConfigLayer, StoreConfig};
//! use std::collections::HashMap;
//!
//! let mut env = HashMap::new();
//! env.insert("REGISTRY_URL".to_string(), "registry.example.com".to_string());
//! env.insert("REGISTRY_USERNAME".to_string(), "ci".to_string());
//!
//! let config = StoreConfig::from_layers([ConfigLayer::from_env(&env)]).unwrap();
//! assert_eq!(config.base_url(), "https://registry.example.com");
//! assert_eq!(config.username.as_deref(), Some("ci"));
//! ```

pub mod layer;
pub mod store;

pub use layer::{
    ConfigLayer, ENV_PASSWORD, ENV_STAGING_DIR, ENV_TIMEOUT_SECS, ENV_URL, ENV_USERNAME,
};
pub use store::{StoreConfig, DEFAULT_LIST_CONCURRENCY, DEFAULT_TIMEOUT};
