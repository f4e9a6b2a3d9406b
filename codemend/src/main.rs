mod cli;
mod commands;
mod interrupt;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use codemend_core::observability;
use interrupt::Interrupt;

fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    let interrupt = Arc::new(Interrupt::new());
    interrupt::install(Arc::clone(&interrupt)).context("Failed to set Ctrl+C handler")?;
    let cancel = interrupt.token();

    let code = match cli.command {
        Commands::Generate {
            request,
            no_execute,
            save,
            max_retries,
            runtime,
            timeout,
        } => {
            let args = commands::generate::GenerateArgs {
                request,
                no_execute,
                save,
                max_retries,
                runtime,
                timeout,
            };
            commands::generate::run(args, &cancel)?
        }
        Commands::Exec {
            file,
            max_retries,
            request,
            no_install,
            runtime,
            timeout,
        } => {
            let args = commands::exec::ExecArgs {
                file,
                max_retries,
                request,
                no_install,
                runtime,
                timeout,
            };
            commands::exec::run(args, &cancel)?
        }
        Commands::Interactive {
            no_execute,
            max_retries,
            runtime,
            timeout,
        } => {
            let args = commands::interactive::InteractiveArgs {
                no_execute,
                max_retries,
                runtime,
                timeout,
            };
            commands::interactive::run(args, &interrupt)?
        }
        Commands::Serve {
            host,
            port,
            max_retries,
            runtime,
            timeout,
        } => {
            let args = commands::serve::ServeArgs {
                host,
                port,
                max_retries,
                runtime,
                timeout,
            };
            commands::serve::run(args, &interrupt)?
        }
        Commands::Deps { file, json } => commands::deps::run(&file, json)?,
    };

    std::process::exit(code);
}
