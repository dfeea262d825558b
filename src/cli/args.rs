//! CLI argument definitions using clap
//!
//! Commands:
//! - timdaen init [--config <path>]
//! - timdaen serve [--config <path>] [--port <port>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// timdaen - record lookup and maintenance service
#[derive(Parser, Debug)]
#[command(name = "timdaen")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the records table in the configured database
    Init {
        /// Path to configuration file (default: chosen by namespace)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Start the HTTP service
    Serve {
        /// Path to configuration file (default: chosen by namespace)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
