//! modreg CLI entry point.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use modreg::cli::{exit_code_for, Cli, CommandDispatcher};
use modreg::registry::ModuleRegistry;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// Logs go to stderr so that `fetch` can stream archives to stdout.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("modreg=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modreg=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("modreg starting with args: {:?}", cli);

    let config = match cli.store_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(exit_code_for(&e) as u8);
        }
    };
    tracing::debug!("Store config: {:?}", config);

    let dispatcher =
        CommandDispatcher::new(ModuleRegistry::from_config(config)).with_operation(cli.operation());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = dispatcher.dispatch(&cli.command, &mut out);
    let _ = out.flush();

    match result {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_code_for(&e) as u8)
        }
    }
}
