//! Subcommand implementations.
//!
//! Commands take an opened engine and, where they print, a writer standing in
//! for stdout.

pub mod entries;
pub mod migrate;
pub mod purge;
pub mod stat;

use std::path::PathBuf;

use anyhow::{Context, Result};
use stowage_core::{CacheKey, EngineKind, StoreConfig};
use url::Url;

/// Turn command-line input into a key.
///
/// Verbatim input is used untouched, input that looks like a URL is
/// normalized before hashing, anything else is hashed as given.
pub fn parse_key(input: &str, verbatim: bool) -> Result<CacheKey> {
    if verbatim {
        return Ok(CacheKey::verbatim(input));
    }
    if input.contains("://") {
        let url = Url::parse(input).with_context(|| format!("invalid URL key {input:?}"))?;
        return Ok(CacheKey::from_url(&url));
    }
    Ok(CacheKey::new(input))
}

/// Apply command-line flags on top of loaded configuration.
///
/// `path` lands in `root` or `db_path` depending on the engine in effect
/// after the engine override.
pub fn apply_overrides(
    config: &mut StoreConfig, engine: Option<EngineKind>, path: Option<PathBuf>, subdirectory: Option<String>,
) {
    if let Some(engine) = engine {
        config.engine = engine;
    }
    if let Some(path) = path {
        match config.engine {
            EngineKind::File => config.root = path,
            EngineKind::Sqlite => config.db_path = path,
        }
    }
    if subdirectory.is_some() {
        config.subdirectory = subdirectory;
    }
}

/// Where a configuration keeps its data.
pub fn location(config: &StoreConfig) -> PathBuf {
    match (config.engine, &config.subdirectory) {
        (EngineKind::File, Some(name)) => config.root.join(name),
        (EngineKind::File, None) => config.root.clone(),
        (EngineKind::Sqlite, _) => config.db_path.clone(),
    }
}
