//! Command implementations

mod config;
mod inspect;
mod process;
mod serve;

use crate::cli::{Cli, Commands, ProcessArgs, ServeArgs};
use crate::environment::RunMode;
use crate::output::OutputWriter;
use anyhow::Result;

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);

    match cli.command {
        Some(Commands::Process(args)) => process::execute(args, &output).await,
        Some(Commands::Serve(args)) => serve::execute(args, &output).await,
        Some(Commands::Inspect(args)) => inspect::execute(args, &output).await,
        Some(Commands::Config) => config::execute(&output),
        None => match RunMode::from_env()? {
            RunMode::Api => serve::execute(ServeArgs::default(), &output).await,
            RunMode::Processor => process::execute(ProcessArgs::default(), &output).await,
        },
    }
}
