//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ConfigLayer, StoreConfig};
use crate::error::Result;
use crate::operation::Operation;

/// modreg - Infrastructure module registry on an OCI artifact store.
#[derive(Debug, Parser)]
#[command(name = "modreg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Artifact store URL (overrides REGISTRY_URL)
    #[arg(long, global = true)]
    pub registry: Option<String>,

    /// Store username (overrides REGISTRY_USERNAME; password comes from REGISTRY_PASSWORD)
    #[arg(short, long, global = true)]
    pub username: Option<String>,

    /// Directory for staging archives before upload
    #[arg(long, global = true)]
    pub staging_dir: Option<PathBuf>,

    /// Give up on the whole operation after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Settings given as flags, as the highest-priority config layer.
    pub fn flag_layer(&self) -> ConfigLayer {
        ConfigLayer {
            url: self.registry.clone(),
            username: self.username.clone(),
            staging_dir: self.staging_dir.clone(),
            ..Default::default()
        }
    }

    /// Resolve the store configuration from file, environment and flags.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let file = match &self.config {
            Some(path) => ConfigLayer::from_file(path)?,
            None => ConfigLayer::default(),
        };

        StoreConfig::from_layers([file, ConfigLayer::from_process_env(), self.flag_layer()])
    }

    /// The operation context implied by `--timeout`.
    pub fn operation(&self) -> Operation {
        match self.timeout {
            Some(secs) => Operation::with_timeout(Duration::from_secs(secs)),
            None => Operation::unbounded(),
        }
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List published modules
    List(ListArgs),

    /// Publish a module archive
    Publish(PublishArgs),

    /// Download a module archive
    Fetch(FetchArgs),
}

/// Arguments for the `list` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ListArgs {
    /// Only list modules in this namespace
    #[arg(long, default_value = "")]
    pub namespace: String,

    /// Only list modules with this name
    #[arg(long, default_value = "")]
    pub name: String,

    /// Only list modules published for this provider
    #[arg(long, default_value = "")]
    pub provider: String,

    /// Skip this many modules
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Show at most this many modules (0 for all)
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Positional module address shared by `publish` and `fetch`.
#[derive(Debug, Clone, clap::Args)]
pub struct ModuleArgs {
    /// Module namespace
    pub namespace: String,

    /// Module name
    pub name: String,

    /// Module provider
    pub provider: String,

    /// Module version
    #[arg(id = "module_version", value_name = "VERSION")]
    pub version: String,
}

/// Arguments for the `publish` command.
#[derive(Debug, Clone, clap::Args)]
pub struct PublishArgs {
    #[command(flatten)]
    pub module: ModuleArgs,

    /// Path to the .tgz archive, or '-' for stdin
    pub archive: PathBuf,
}

/// Arguments for the `fetch` command.
#[derive(Debug, Clone, clap::Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub module: ModuleArgs,

    /// Write the archive here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
