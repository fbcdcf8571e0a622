//! CLI module for designsync
//!
//! Provides command-line interface for:
//! - init: Create directory structure
//! - apply: Synchronize one design from the design directory
//! - inspect: Print a tenant's tables
//! - compare: Compare two design versions

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{apply, compare, design_request, init, inspect, run, run_command, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
