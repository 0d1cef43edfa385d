mod api;
mod commands;
mod config;
mod context;
mod document;
mod engine;
mod export;
mod output;
mod test_helpers;
mod traits;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{ExportCommand, ImportCommand};
use context::Context;

#[derive(Parser)]
#[command(name = "meshctl")]
#[command(about = "Manage mesh network configuration as code", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the account configuration to a portable document
    Export(ExportCommand),

    /// Import a configuration document into the account
    Import(ImportCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = Context::new();

    match cli.command {
        Commands::Export(cmd) => {
            cmd.execute(&ctx)?;
        }
        Commands::Import(cmd) => {
            let summary = cmd.execute(&ctx)?;
            if summary.has_failures() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
