//! CLI module for geoquery
//!
//! Operator commands:
//! - compile / assemble: render a filter or an items request offline
//! - breaks: equal-interval buckets for a range
//! - cache-size / purge-cache: tile cache administration
//! - check-config: validate a configuration file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    assemble, breaks, cache_size, check_config, compile, execute, purge_cache, run, run_command,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
