//! Fetch command implementation.
//!
//! The `modreg fetch` command downloads a module archive to a file or
//! stdout.

use std::io::Write;

use crate::cli::args::FetchArgs;
use crate::error::{RegistryError, Result};
use crate::module::ModuleIdentity;
use crate::operation::Operation;
use crate::registry::ModuleRegistry;
use crate::store::StoreConnector;

use super::dispatcher::{Command, CommandResult};

/// The fetch command implementation.
pub struct FetchCommand {
    args: FetchArgs,
}

impl FetchCommand {
    /// Create a new fetch command.
    pub fn new(args: FetchArgs) -> Self {
        Self { args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &FetchArgs {
        &self.args
    }
}

impl Command for FetchCommand {
    fn execute<C: StoreConnector>(
        &self,
        registry: &ModuleRegistry<C>,
        op: &Operation,
        out: &mut dyn Write,
    ) -> Result<CommandResult> {
        let m = &self.args.module;
        let identity = ModuleIdentity::new(
            m.namespace.as_str(),
            m.name.as_str(),
            m.provider.as_str(),
            m.version.as_str(),
        );

        let data = registry.get_module_data_with(&identity, op)?;

        match &self.args.output {
            Some(path) => {
                std::fs::write(path, &data).map_err(|e| {
                    RegistryError::staging(format!("cannot write {}: {}", path.display(), e))
                })?;
                tracing::info!("Wrote {} bytes to {}", data.len(), path.display());
            }
            None => {
                out.write_all(&data)?;
                out.flush()?;
            }
        }

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::ModuleArgs;
    use crate::staging::StagingArea;
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    fn module_args() -> ModuleArgs {
        ModuleArgs {
            namespace: "acme".into(),
            name: "vpc".into(),
            provider: "aws".into(),
            version: "1.0.0".into(),
        }
    }

    fn published(staging: &TempDir) -> ModuleRegistry<MemoryStore> {
        let registry = ModuleRegistry::new(MemoryStore::new(), StagingArea::new(staging.path()));
        registry
            .publish_module(
                &ModuleIdentity::new("acme", "vpc", "aws", "1.0.0"),
                &mut &b"archive bytes"[..],
            )
            .unwrap();
        registry
    }

    #[test]
    fn writes_archive_to_stdout() {
        let staging = TempDir::new().unwrap();
        let registry = published(&staging);

        let mut out = Vec::new();
        FetchCommand::new(FetchArgs {
            module: module_args(),
            output: None,
        })
        .execute(&registry, &Operation::unbounded(), &mut out)
        .unwrap();

        assert_eq!(out, b"archive bytes");
    }

    #[test]
    fn writes_archive_to_file() {
        let staging = TempDir::new().unwrap();
        let registry = published(&staging);
        let target = TempDir::new().unwrap();
        let path = target.path().join("vpc.tgz");

        let mut out = Vec::new();
        FetchCommand::new(FetchArgs {
            module: module_args(),
            output: Some(path.clone()),
        })
        .execute(&registry, &Operation::unbounded(), &mut out)
        .unwrap();

        assert!(out.is_empty());
        assert_eq!(std::fs::read(path).unwrap(), b"archive bytes");
    }
}
