//! CLI module for timdaen
//!
//! Provides command-line interface for:
//! - init: Create the records table
//! - serve: Boot the HTTP service

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{init, load_config, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
