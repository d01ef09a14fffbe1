//! CLI argument definitions using clap
//!
//! Commands:
//! - geoquery compile --catalog <path> --table <schema.table> --filter <text>
//! - geoquery assemble --catalog <path> --table <schema.table> [--param k=v]...
//! - geoquery breaks --min <n> --max <n> [--bins <n>]
//! - geoquery cache-size --config <path> --table <schema.table>
//! - geoquery purge-cache --config <path> --table <schema.table>
//! - geoquery check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// geoquery - filter compilation, query assembly and tile cache tooling
#[derive(Parser, Debug)]
#[command(name = "geoquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a filter expression and print the parameterized predicate
    Compile {
        /// Path to a JSON catalog file
        #[arg(long)]
        catalog: PathBuf,

        /// Table as schema.table
        #[arg(long)]
        table: String,

        #[arg(long)]
        filter: String,

        /// SRID for spatial literals
        #[arg(long, default_value_t = 4326)]
        srid: u32,
    },

    /// Assemble an items query and print the page and count statements
    Assemble {
        /// Path to a JSON catalog file
        #[arg(long)]
        catalog: PathBuf,

        /// Table as schema.table
        #[arg(long)]
        table: String,

        /// Request parameter as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },

    /// Print equal-interval buckets for a range
    Breaks {
        #[arg(long, allow_negative_numbers = true)]
        min: f64,

        #[arg(long, allow_negative_numbers = true)]
        max: f64,

        #[arg(long, default_value_t = 10)]
        bins: u32,
    },

    /// Print the bytes held by a table's tile cache
    CacheSize {
        /// Path to configuration file
        #[arg(long, default_value = "./geoquery.json")]
        config: PathBuf,

        /// Table as schema.table
        #[arg(long)]
        table: String,
    },

    /// Invalidate a table's tiles and delete stale epochs
    PurgeCache {
        /// Path to configuration file
        #[arg(long, default_value = "./geoquery.json")]
        config: PathBuf,

        /// Table as schema.table
        #[arg(long)]
        table: String,
    },

    /// Load and validate a configuration file
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./geoquery.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compile() {
        let cli = Cli::try_parse_from([
            "geoquery",
            "compile",
            "--catalog",
            "catalog.json",
            "--table",
            "public.states",
            "--filter",
            "state_name = 'Ohio'",
        ])
        .unwrap();

        match cli.command {
            Command::Compile { table, srid, .. } => {
                assert_eq!(table, "public.states");
                assert_eq!(srid, 4326);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_params() {
        let cli = Cli::try_parse_from([
            "geoquery",
            "assemble",
            "--catalog",
            "catalog.json",
            "--table",
            "public.states",
            "--param",
            "limit=5",
            "--param",
            "filter=pop > 10",
        ])
        .unwrap();

        match cli.command {
            Command::Assemble { params, .. } => {
                assert_eq!(params[0], ("limit".to_string(), "5".to_string()));
                assert_eq!(params[1].1, "pop > 10");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bad_param_rejected() {
        let result = Cli::try_parse_from([
            "geoquery",
            "assemble",
            "--catalog",
            "c.json",
            "--table",
            "public.states",
            "--param",
            "novalue",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_bounds() {
        let cli = Cli::try_parse_from(["geoquery", "breaks", "--min", "-10", "--max", "10"]).unwrap();
        assert!(matches!(cli.command, Command::Breaks { min, bins: 10, .. } if min == -10.0));
    }
}
