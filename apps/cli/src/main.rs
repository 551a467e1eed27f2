//! archdocs CLI: architecture documentation for a repository.
//!
//! Runs as a GitHub Action (inputs from `INPUT_*`, outputs to
//! `$GITHUB_OUTPUT`) or locally from a terminal.

mod actions;
mod commands;
mod settings;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    let verbose = cli.verbose > 0;

    if let Err(e) = commands::run(cli).await {
        println!("::error::{e:#}");
        if verbose {
            eprintln!("{e:?}");
        }
        std::process::exit(1);
    }
    Ok(())
}
