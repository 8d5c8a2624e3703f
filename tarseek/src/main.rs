mod cli;
mod commands;
mod error;

use anyhow::Context;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::from_iter(wild::args_os());

    let default_level = if cli.verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List(args) => commands::list(args).context("Listing archive failed")?,
        Commands::Cat(args) => commands::cat(args).context("Reading from archive failed")?,
        Commands::Rebuild(args) => {
            commands::rebuild(args).context("Rebuilding statemap failed")?
        }
    };

    Ok(())
}
