//! Publish command implementation.
//!
//! The `modreg publish` command uploads a module archive from a file or
//! stdin.

use std::fs::File;
use std::io::{self, Read, Write};

use crate::cli::args::PublishArgs;
use crate::error::{RegistryError, Result};
use crate::module::ModuleIdentity;
use crate::operation::Operation;
use crate::registry::ModuleRegistry;
use crate::store::StoreConnector;

use super::dispatcher::{Command, CommandResult};

/// The publish command implementation.
pub struct PublishCommand {
    args: PublishArgs,
}

impl PublishCommand {
    /// Create a new publish command.
    pub fn new(args: PublishArgs) -> Self {
        Self { args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &PublishArgs {
        &self.args
    }

    fn identity(&self) -> ModuleIdentity {
        let m = &self.args.module;
        ModuleIdentity::new(
            m.namespace.as_str(),
            m.name.as_str(),
            m.provider.as_str(),
            m.version.as_str(),
        )
    }

    fn open_archive(&self) -> Result<Box<dyn Read>> {
        if self.args.archive.as_os_str() == "-" {
            return Ok(Box::new(io::stdin().lock()));
        }

        let file = File::open(&self.args.archive).map_err(|e| {
            RegistryError::staging(format!(
                "cannot open {}: {}",
                self.args.archive.display(),
                e
            ))
        })?;
        Ok(Box::new(file))
    }
}

impl Command for PublishCommand {
    fn execute<C: StoreConnector>(
        &self,
        registry: &ModuleRegistry<C>,
        op: &Operation,
        out: &mut dyn Write,
    ) -> Result<CommandResult> {
        let identity = self.identity();
        let mut archive = self.open_archive()?;

        let descriptor = registry.publish_module_with(&identity, archive.as_mut(), op)?;

        writeln!(
            out,
            "Published {}/{}:{} ({})",
            identity.namespace, identity.name, identity.version, descriptor.digest
        )?;

        Ok(CommandResult::success())
    }
}
