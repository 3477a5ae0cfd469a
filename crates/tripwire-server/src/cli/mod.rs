pub mod config_cmd;
pub mod doctor;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tripwire")]
#[command(version, about = "Turns error bursts into deduplicated GitHub issues")]
pub struct Cli {
    /// Path to tripwire.toml
    #[arg(
        long,
        global = true,
        env = "TRIPWIRE_CONFIG",
        default_value = "tripwire.toml"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the log store and open tickets for actionable error bursts
    Watch,
    /// Serve the issue tracker facade over GitHub
    Tracker,
    /// Check configuration and collaborator reachability
    Doctor,
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    Validate,
    Show,
}
