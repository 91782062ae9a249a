//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations against one [`ModuleRegistry`].
//!
//! [`ModuleRegistry`]: crate::registry::ModuleRegistry

pub mod dispatcher;
pub mod fetch;
pub mod list;
pub mod publish;

pub use dispatcher::{exit_code_for, Command, CommandDispatcher, CommandResult};
