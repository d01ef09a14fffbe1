//! CLI command implementations
//!
//! Each command produces one JSON value; [`run_command`] prints it, or the
//! error, through the JSON output helpers.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{json, Value};

use crate::catalog::{ColumnCatalog, MemoryCatalog, TableRef};
use crate::classify::equal_interval;
use crate::config::ServiceConfig;
use crate::filter::{parse, FilterCompiler};
use crate::observability::{log_event_with_fields, Event};
use crate::query::{ItemsRequest, QueryAssembler, ToStatement};
use crate::tile_cache::TileCache;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Main entry point for CLI
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run a command and print its result
pub fn run_command(cmd: Command) -> CliResult<()> {
    match execute(cmd) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Run a command and return its result without printing
pub fn execute(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Compile {
            catalog,
            table,
            filter,
            srid,
        } => compile(&catalog, &table, &filter, srid),
        Command::Assemble {
            catalog,
            table,
            params,
        } => assemble(&catalog, &table, params.into_iter().collect()),
        Command::Breaks { min, max, bins } => breaks(min, max, bins),
        Command::CacheSize { config, table } => cache_size(&config, &table),
        Command::PurgeCache { config, table } => purge_cache(&config, &table),
        Command::CheckConfig { config } => check_config(&config),
    }
}

/// Compile a filter against a catalog file
pub fn compile(catalog_path: &Path, table: &str, filter: &str, srid: u32) -> CliResult<Value> {
    let catalog = load_snapshot(catalog_path, table)?;

    let ast = parse(filter)?;
    let predicate = FilterCompiler::new(&catalog).with_srid(srid).compile(&ast)?;

    Ok(json!({
        "fragment": predicate.fragment(),
        "parameters": predicate.parameters(),
    }))
}

/// Assemble the page and count statements of an items request
pub fn assemble(
    catalog_path: &Path,
    table: &str,
    params: HashMap<String, String>,
) -> CliResult<Value> {
    let catalog = load_snapshot(catalog_path, table)?;

    let request = ItemsRequest::parse(&params)?;
    let assembled = QueryAssembler::new(&catalog).assemble(&request)?;

    Ok(json!({
        "query": assembled.query.to_statement(),
        "count": assembled.count.to_statement(),
    }))
}

/// Equal-interval buckets over `[min, max]`
pub fn breaks(min: f64, max: f64, bins: u32) -> CliResult<Value> {
    let buckets = equal_interval(min, max, bins)?;
    Ok(serde_json::to_value(buckets)?)
}

pub fn cache_size(config_path: &Path, table: &str) -> CliResult<Value> {
    let (cache, table) = open_cache(config_path, table)?;

    Ok(json!({
        "table": table.to_string(),
        "size_in_bytes": cache.cache_size(&table)?,
        "live_size_in_bytes": cache.live_size(&table)?,
    }))
}

/// Invalidate a table and delete every stale epoch
pub fn purge_cache(config_path: &Path, table: &str) -> CliResult<Value> {
    let (cache, table) = open_cache(config_path, table)?;

    let epoch = cache.invalidate_table(&table)?;
    let removed = cache.purge_stale(&table)?;
    log_event_with_fields(
        Event::CachePurged,
        &[("table", &table.to_string()), ("removed", &removed.to_string())],
    );

    Ok(json!({
        "table": table.to_string(),
        "epoch": epoch,
        "removed": removed,
    }))
}

pub fn check_config(config_path: &Path) -> CliResult<Value> {
    let config = ServiceConfig::load(config_path)?;
    log_event_with_fields(
        Event::ConfigLoaded,
        &[("path", &config_path.display().to_string())],
    );
    Ok(serde_json::to_value(config)?)
}

fn load_snapshot(catalog_path: &Path, table: &str) -> CliResult<crate::catalog::Catalog> {
    let table: TableRef = table.parse()?;
    let catalog = MemoryCatalog::load(catalog_path)?;
    Ok(catalog.snapshot(&table)?)
}

fn open_cache(config_path: &Path, table: &str) -> CliResult<(TileCache, TableRef)> {
    let table: TableRef = table.parse()?;
    let config = ServiceConfig::load(config_path)?;
    if !config.cache_dir.is_dir() {
        return Err(CliError::config_error(format!(
            "cache_dir {} does not exist",
            config.cache_dir.display()
        )));
    }
    Ok((TileCache::local(config.cache_dir.clone(), config.cache_max_age()), table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile_cache::TileKey;
    use std::fs;
    use tempfile::TempDir;

    const CATALOG: &str = r#"{
        "tables": [{
            "schema": "public",
            "name": "states",
            "columns": [
                {"name": "gid", "data_type": "integer"},
                {"name": "state_name", "data_type": "character varying"},
                {"name": "geom", "data_type": "geometry"}
            ]
        }]
    }"#;

    fn write_catalog(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("catalog.json");
        fs::write(&path, CATALOG).unwrap();
        path
    }

    fn write_config(dir: &TempDir) -> std::path::PathBuf {
        let cache_dir = dir.path().join("cache");
        fs::create_dir_all(&cache_dir).unwrap();
        let path = dir.path().join("geoquery.json");
        let config = json!({ "cache_dir": cache_dir, "cache_max_age_secs": 60 });
        fs::write(&path, config.to_string()).unwrap();
        path
    }

    #[test]
    fn test_compile_prints_fragment_and_parameters() {
        let temp = TempDir::new().unwrap();
        let catalog = write_catalog(&temp);

        let out = compile(&catalog, "public.states", "state_name = 'New York'", 4326).unwrap();
        assert_eq!(out["fragment"], "\"state_name\" = $1");
        assert_eq!(out["parameters"], json!(["New York"]));
    }

    #[test]
    fn test_compile_unknown_column() {
        let temp = TempDir::new().unwrap();
        let catalog = write_catalog(&temp);

        let err = compile(&catalog, "public.states", "state_names = 'x'", 4326).unwrap_err();
        assert_eq!(err.code_str(), "GEOQUERY_CLI_INVALID_INPUT");
        assert!(err.message().contains("state_names"));
    }

    #[test]
    fn test_assemble_renders_both_statements() {
        let temp = TempDir::new().unwrap();
        let catalog = write_catalog(&temp);

        let params: HashMap<String, String> = [("limit", "5"), ("state_name", "Ohio")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let out = assemble(&catalog, "public.states", params).unwrap();
        let query = out["query"]["text"].as_str().unwrap();
        let count = out["count"]["text"].as_str().unwrap();

        assert!(query.contains("LIMIT"));
        assert!(count.starts_with("SELECT COUNT(*)"));
        assert!(!count.contains("LIMIT"));
        assert_eq!(out["count"]["parameters"], json!(["Ohio"]));
    }

    #[test]
    fn test_breaks() {
        let out = breaks(0.0, 100.0, 4).unwrap();
        let buckets = out.as_array().unwrap();
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[3]["max"], 100.0);
        assert!(breaks(0.0, 100.0, 0).is_err());
    }

    #[test]
    fn test_purge_cache() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp);
        let config = ServiceConfig::load(&config_path).unwrap();

        let table = TableRef::new("public", "states");
        let cache = TileCache::local(config.cache_dir.clone(), config.cache_max_age());
        cache
            .store(&TileKey::new(table.clone(), "WebMercatorQuad", 1, 0, 0), b"tile")
            .unwrap();

        let size = cache_size(&config_path, "public.states").unwrap();
        assert!(size["size_in_bytes"].as_u64().unwrap() >= 4);

        let out = purge_cache(&config_path, "public.states").unwrap();
        assert_eq!(out["epoch"], 1);
        assert_eq!(out["removed"], 1);

        let size = cache_size(&config_path, "public.states").unwrap();
        assert_eq!(size["live_size_in_bytes"], 0);
    }

    #[test]
    fn test_check_config() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp);

        let out = check_config(&config_path).unwrap();
        assert_eq!(out["cache_max_age_secs"], 60);
        assert_eq!(out["surrogate_key"], "gid");
    }

    #[test]
    fn test_missing_cache_dir() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("geoquery.json");
        fs::write(&path, r#"{"cache_dir": "/nonexistent/geoquery-cache"}"#).unwrap();

        let err = cache_size(&path, "public.states").unwrap_err();
        assert_eq!(err.code_str(), "GEOQUERY_CLI_CONFIG_ERROR");
    }
}
