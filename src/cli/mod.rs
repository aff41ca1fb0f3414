//! CLI module for Seatwatch
//!
//! - `serve`: run the watcher and the bot (default)
//! - `windows`: print the polling schedule generated from the deadlines
//! - `check`: fetch the feed once and print a summary

use crate::server::AppConfig;
use clap::{Parser, Subcommand};

pub mod check;
pub mod windows;

/// Course seat watcher
#[derive(Parser, Debug)]
#[command(name = "seatwatch")]
#[command(about = "Notifies subscribers when course sections open or fill")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the watcher (default)
    Serve,
    /// Print the generated polling schedule
    Windows,
    /// Fetch the feed once and print a summary
    Check,
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => crate::server::run(config).await,
        Commands::Windows => windows::run(&config),
        Commands::Check => check::run(&config).await,
    }
}
