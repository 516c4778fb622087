//! Metadata reports printed as JSON.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stowage_core::{CacheKey, EngineKind, StorageEngine, StoreConfig};

/// Output of `stat` without a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStat {
    pub engine: EngineKind,
    pub location: PathBuf,
    pub key_count: usize,
}

/// Output of `stat <key>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyStat {
    /// Identifier the engine stores under.
    pub key: String,
    /// Input the key was derived from.
    pub input: String,
    pub exists: bool,
    pub size: Option<usize>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_accessed: Option<DateTime<Utc>>,
}

pub async fn store_stat(engine: &dyn StorageEngine, config: &StoreConfig) -> Result<StoreStat> {
    Ok(StoreStat { engine: config.engine, location: super::location(config), key_count: engine.key_count().await? })
}

pub async fn key_stat(engine: &dyn StorageEngine, key: &CacheKey) -> Result<KeyStat> {
    // Timestamps first; reading the value moves the access time on some filesystems.
    let created_at = engine.created_at(key).await?;
    let updated_at = engine.updated_at(key).await?;
    let last_accessed = engine.last_accessed(key).await?;
    let size = engine.read(key).await?.map(|data| data.len());

    Ok(KeyStat {
        key: key.value().to_string(),
        input: key.raw_value().to_string(),
        exists: size.is_some(),
        size,
        created_at,
        updated_at,
        last_accessed,
    })
}
