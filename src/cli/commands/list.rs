//! List command implementation.
//!
//! The `modreg list` command lists published modules.

use std::io::Write;

use crate::cli::args::ListArgs;
use crate::error::Result;
use crate::module::{ListQuery, ModulePage};
use crate::operation::Operation;
use crate::registry::ModuleRegistry;
use crate::store::StoreConnector;

use super::dispatcher::{Command, CommandResult};

/// The list command implementation.
pub struct ListCommand {
    args: ListArgs,
}

impl ListCommand {
    /// Create a new list command.
    pub fn new(args: ListArgs) -> Self {
        Self { args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &ListArgs {
        &self.args
    }

    fn query(&self) -> ListQuery {
        ListQuery::all()
            .namespace(self.args.namespace.as_str())
            .name(self.args.name.as_str())
            .provider(self.args.provider.as_str())
            .page(self.args.offset, self.args.limit)
    }

    fn write_table(page: &ModulePage, out: &mut dyn Write) -> std::io::Result<()> {
        if page.modules.is_empty() {
            writeln!(out, "No modules found.")?;
            return Ok(());
        }

        for record in &page.modules {
            let id = &record.identity;
            let size = record
                .archive_size
                .map(|s| format!("{} B", s))
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                out,
                "{}/{}/{}  {}  {}  {}",
                id.namespace, id.name, id.provider, id.version, size, record.digest
            )?;
        }

        writeln!(out)?;
        writeln!(out, "Showing {} of {} module(s)", page.modules.len(), page.total)
    }
}

impl Command for ListCommand {
    fn execute<C: StoreConnector>(
        &self,
        registry: &ModuleRegistry<C>,
        op: &Operation,
        out: &mut dyn Write,
    ) -> Result<CommandResult> {
        let page = registry.list_modules_with(&self.query(), op)?;

        if self.args.json {
            serde_json::to_writer_pretty(&mut *out, &page).map_err(anyhow::Error::from)?;
            writeln!(out)?;
        } else {
            Self::write_table(&page, out)?;
        }

        Ok(CommandResult::success())
    }
}
