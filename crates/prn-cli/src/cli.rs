//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Pull request activity notifier.
///
/// Reconciles freshly fetched pull request activity against a persistent
/// logbook and prints one notification per event not seen before.
#[derive(Debug, Parser)]
#[command(name = "prn", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one reconciliation pass over fetched activity.
    Reconcile {
        /// JSON file with pull requests and their activity batches.
        ///
        /// Reads from stdin when omitted.
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show the logbook and the last pass.
    Status,
}
