//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::io::Write;

use crate::cli::args::Commands;
use crate::error::{ErrorKind, RegistryError, Result};
use crate::operation::Operation;
use crate::registry::ModuleRegistry;
use crate::store::StoreConnector;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Arguments
    ///
    /// * `registry` - Registry the command operates on
    /// * `op` - Deadline and cancellation for the store calls
    /// * `out` - Where command output goes (stdout in the binary)
    fn execute<C: StoreConnector>(
        &self,
        registry: &ModuleRegistry<C>,
        op: &Operation,
        out: &mut dyn Write,
    ) -> Result<CommandResult>;
}

/// Result of command execution.
///
/// Failures are reported as errors and mapped by [`exit_code_for`]; a result
/// always describes a command that ran to completion.
#[derive(Debug)]
pub struct CommandResult {
    /// Exit code to use.
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self { exit_code: 0 }
    }
}

/// Exit code for a command that failed with `err`.
///
/// Configuration errors exit with 2, missing modules with 3, everything
/// else with 1.
pub fn exit_code_for(err: &RegistryError) -> i32 {
    match err.kind() {
        ErrorKind::Config => 2,
        ErrorKind::NotFound => 3,
        _ => 1,
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher<C> {
    registry: ModuleRegistry<C>,
    operation: Operation,
}

impl<C: StoreConnector> CommandDispatcher<C> {
    /// Create a new dispatcher for the given registry.
    pub fn new(registry: ModuleRegistry<C>) -> Self {
        Self {
            registry,
            operation: Operation::unbounded(),
        }
    }

    /// Run commands under the given operation context.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    /// Get the registry.
    pub fn registry(&self) -> &ModuleRegistry<C> {
        &self.registry
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, command: &Commands, out: &mut dyn Write) -> Result<CommandResult> {
        match command {
            Commands::List(args) => {
                let cmd = super::list::ListCommand::new(args.clone());
                cmd.execute(&self.registry, &self.operation, out)
            }
            Commands::Publish(args) => {
                let cmd = super::publish::PublishCommand::new(args.clone());
                cmd.execute(&self.registry, &self.operation, out)
            }
            Commands::Fetch(args) => {
                let cmd = super::fetch::FetchCommand::new(args.clone());
                cmd.execute(&self.registry, &self.operation, out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{FetchArgs, ListArgs, ModuleArgs};
    use crate::staging::StagingArea;
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn command_result_success() {
        assert_eq!(CommandResult::success().exit_code, 0);
    }

    #[test]
    fn exit_codes_by_kind() {
        let config = RegistryError::Config {
            message: "no url".into(),
        };
        let missing = RegistryError::NotFound {
            repository: "acme/vpc".into(),
            reference: "1.0.0".into(),
        };
        assert_eq!(exit_code_for(&config), 2);
        assert_eq!(exit_code_for(&missing), 3);
        assert_eq!(exit_code_for(&RegistryError::protocol("x")), 1);
    }

    #[test]
    fn dispatch_routes_list_and_fetch() {
        let temp = TempDir::new().unwrap();
        let registry = ModuleRegistry::new(MemoryStore::new(), StagingArea::new(temp.path()));
        let dispatcher = CommandDispatcher::new(registry);

        let mut out = Vec::new();
        let result = dispatcher
            .dispatch(&Commands::List(ListArgs::default()), &mut out)
            .unwrap();
        assert_eq!(result.exit_code, 0);

        let fetch = Commands::Fetch(FetchArgs {
            module: ModuleArgs {
                namespace: "acme".into(),
                name: "vpc".into(),
                provider: "aws".into(),
                version: "1.0.0".into(),
            },
            output: None,
        });
        let err = dispatcher.dispatch(&fetch, &mut out).unwrap_err();
        assert!(err.is_not_found());
    }
}
