//! Store configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STOWAGE_*)
//! 2. TOML config file (if STOWAGE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, FileEngine, SqliteEngine, SqliteOptions, StorageEngine};

mod validation;

pub use validation::ConfigError;

/// Which engine a [`StoreConfig`] opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// One file per key under `root`.
    File,
    /// One SQLite database at `db_path`.
    Sqlite,
}

/// Store configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STOWAGE_*)
/// 2. TOML config file (if STOWAGE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Engine to open.
    ///
    /// Set via STOWAGE_ENGINE environment variable (`file` or `sqlite`).
    #[serde(default = "default_engine")]
    pub engine: EngineKind,

    /// Root directory of the file engine.
    ///
    /// Set via STOWAGE_ROOT environment variable.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Subdirectory of `root` the file engine stores keys in.
    ///
    /// Set via STOWAGE_SUBDIRECTORY environment variable.
    #[serde(default)]
    pub subdirectory: Option<String>,

    /// Path to the SQLite database file.
    ///
    /// Set via STOWAGE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// SQLite busy timeout in milliseconds.
    ///
    /// Set via STOWAGE_BUSY_TIMEOUT_MS environment variable.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_engine() -> EngineKind {
    EngineKind::Sqlite
}

fn default_root() -> PathBuf {
    PathBuf::from("./stowage-data")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./stowage.sqlite")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            root: default_root(),
            subdirectory: None,
            db_path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Busy timeout as Duration for the SQLite connection.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `STOWAGE_`
    /// 2. TOML file from `STOWAGE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STOWAGE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("STOWAGE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Open the configured engine.
    ///
    /// The configuration is validated first, so a hand-built config with bad
    /// values fails here rather than inside the engine.
    pub async fn open_engine(&self) -> Result<Arc<dyn StorageEngine>, Error> {
        self.validate()?;

        match self.engine {
            EngineKind::File => {
                let engine = FileEngine::open(&self.root).await?;
                match &self.subdirectory {
                    Some(name) => Ok(Arc::new(engine.subdirectory(name)?)),
                    None => Ok(Arc::new(engine)),
                }
            }
            EngineKind::Sqlite => {
                let options = SqliteOptions { busy_timeout: self.busy_timeout(), ..SqliteOptions::default() };
                Ok(Arc::new(SqliteEngine::open_with(&self.db_path, options).await?))
            }
        }
    }
}
