use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rewind: seed once, snapshot, and restore test databases
#[derive(Parser, Debug)]
#[command(
    name = "rewind",
    version,
    about = "Seed containerized test databases once, then restore snapshots between tests.",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Path to rewind.json (defaults to the nearest one above the current directory)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log every command and SQL round-trip
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Restore each target from its snapshot, or seed and snapshot it when stale
    Init {
        /// Target name (all targets if omitted)
        target: Option<String>,
    },

    /// Restore targets from their snapshots
    Reset {
        /// Target name (all targets if omitted)
        target: Option<String>,
    },

    /// Reseed a target and take a new snapshot
    Snapshot {
        /// Target name
        target: String,
    },

    /// Show whether each target's snapshot is fresh
    Status,

    /// List configured targets
    Targets,

    /// Print CLI version
    Version,
}
