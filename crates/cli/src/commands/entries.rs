//! put, get, rm, ls and clear.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use stowage_core::{CacheKey, StorageEngine};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes to store: `value` if given, else the contents of `file`, else stdin.
pub async fn read_input(value: Option<String>, file: Option<PathBuf>) -> Result<Vec<u8>> {
    match (value, file) {
        (Some(value), _) => Ok(value.into_bytes()),
        (None, Some(path)) => tokio::fs::read(&path).await.with_context(|| format!("failed to read {}", path.display())),
        (None, None) => {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await.context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

pub async fn put(engine: &dyn StorageEngine, key: &CacheKey, data: Vec<u8>) -> Result<()> {
    let bytes = data.len();
    engine.write(key, data).await.with_context(|| format!("failed to store {}", key.raw_value()))?;
    tracing::info!(key = %key, bytes, "stored value");
    Ok(())
}

pub async fn get<W: AsyncWrite + Unpin>(engine: &dyn StorageEngine, key: &CacheKey, out: &mut W) -> Result<()> {
    let Some(data) = engine.read(key).await? else {
        bail!("no value stored for {}", key.raw_value());
    };
    out.write_all(&data).await?;
    out.flush().await?;
    Ok(())
}

pub async fn remove(engine: &dyn StorageEngine, keys: &[CacheKey]) -> Result<()> {
    engine.remove_many(keys).await?;
    tracing::info!(count = keys.len(), "removed keys");
    Ok(())
}

/// Print keys in ascending order, one per line.
pub async fn list<W: AsyncWrite + Unpin>(engine: &dyn StorageEngine, long: bool, out: &mut W) -> Result<()> {
    let mut keys = engine.all_keys().await?;
    keys.sort();

    for key in &keys {
        let line = if long {
            let updated = engine
                .updated_at(key)
                .await?
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            format!("{key}\t{updated}\n")
        } else {
            format!("{key}\n")
        };
        out.write_all(line.as_bytes()).await?;
    }

    out.flush().await?;
    Ok(())
}

/// Remove every key, returning how many there were.
pub async fn clear(engine: &dyn StorageEngine) -> Result<usize> {
    let count = engine.key_count().await?;
    engine.remove_all().await?;
    tracing::info!(count, "cleared store");
    Ok(count)
}
