//! Command-line interface for reading VFK cadastral exchange files.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod inspect;

pub use error::CliError;

use inspect::{InspectArgs, run_inspect};

/// Run the VFK CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Inspect(args) => run_inspect(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "vfk",
    about = "Read Czech cadastral exchange (VFK) files",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read a source, resolve its geometry, and summarise the blocks.
    Inspect(InspectArgs),
}

#[cfg(test)]
mod tests;
