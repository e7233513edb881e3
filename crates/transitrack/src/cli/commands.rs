//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Override the HTTP API bind address
    #[arg(long, value_name = "ADDR")]
    pub http_addr: Option<String>,

    /// Override the live channel bind address
    #[arg(long, value_name = "ADDR")]
    pub live_addr: Option<String>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Latest-location command arguments.
#[derive(Debug, Args)]
pub struct LatestCommand {
    /// The entity to look up
    pub entity_id: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Stop index commands.
#[derive(Debug, Subcommand)]
pub enum StopsCommand {
    /// Import stops from a TOML seed file
    Import {
        /// Path to the seed file
        file: PathBuf,
    },

    /// List all stops in the index
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
