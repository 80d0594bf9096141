//! CLI argument definitions using clap
//!
//! Commands:
//! - filevault storage [--config <path>]
//! - filevault identity [--config <path>]
//! - filevault reconcile [--config <path>] [--prune-dangling]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// FileVault - permission-checked file storage with a companion identity service
#[derive(Parser, Debug)]
#[command(name = "filevault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the storage service
    Storage {
        /// Path to configuration file (defaults apply without one)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the identity service
    Identity {
        /// Path to configuration file (defaults apply without one)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run one reconcile sweep over the storage service's stores and exit
    Reconcile {
        /// Path to the storage configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Delete rows whose blob is missing
        #[arg(long)]
        prune_dangling: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
