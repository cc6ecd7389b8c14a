//! cwatch binary entrypoint.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use cwatch_cli::cli::{Cli, Commands};
use cwatch_cli::commands::{CheckCommand, OnceCommand, RunCommand};
use cwatch_cli::logging;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Check(args) => {
            CheckCommand::new(&cli.config).execute(&mut stdout, args)?;
        }
        Commands::Once(args) => {
            let runtime = runtime()?;
            runtime.block_on(OnceCommand::new(&cli.config).execute(&mut stdout, args))?;
        }
        Commands::Run(args) => {
            let runtime = runtime()?;
            runtime.block_on(RunCommand::new(&cli.config).execute(&mut stdout, args))?;
        }
    }

    Ok(())
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to create async runtime")
}
