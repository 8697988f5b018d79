//! lea CLI - a minimalist SQL transformation orchestrator

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod git;
mod progress;

use cli::Cli;
use commands::{ls, run, teardown};

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<()> = match &cli.command {
        cli::Commands::Run(args) => run::execute(args, &cli.global).await,
        cli::Commands::Ls(args) => ls::execute(args, &cli.global).await,
        cli::Commands::Teardown(args) => teardown::execute(args, &cli.global).await,
    };

    if let Err(err) = result {
        // Structured exit carrying a specific code, not a real error
        if let Some(exit_code) = err.downcast_ref::<commands::common::ExitCode>() {
            std::process::exit(exit_code.0);
        }
        eprintln!("Error: {:?}", err);
        std::process::exit(1);
    }
}
